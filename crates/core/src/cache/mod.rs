//! SQLite-backed storage for versioned cache generations.
//!
//! Each generation is a named mapping from request identity to the last
//! successful response stored for it. Access is async via tokio-rusqlite:
//!
//! - One row per identity per generation (upsert on write)
//! - Deleting a generation cascades to all of its entries
//! - Automatic schema migrations
//! - WAL mode for concurrent readers

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::Generation;
