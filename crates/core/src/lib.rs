//! Core types and shared functionality for pagekeep.
//!
//! This crate provides:
//! - Versioned cache storage with SQLite backend
//! - The request/response model shared by the network client and the worker
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, Generation};
pub use config::{ConfigError, ConfigOverrides, HostClass, HostRule, WorkerConfig};
pub use error::Error;
pub use request::{Destination, Request, RequestMode, Response};
