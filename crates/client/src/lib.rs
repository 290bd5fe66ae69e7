//! Network access for pagekeep.
//!
//! This crate provides the [`Fetcher`] seam the worker talks to and the
//! reqwest-backed implementation used in production.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Fetcher, UrlError, canonicalize};
