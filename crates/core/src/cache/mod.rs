//! SQLite-backed partition store for cached responses.
//!
//! This module provides the persistent cache behind the offline layer using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named, versioned partitions created lazily on first write
//! - Last-writer-wins snapshot replacement keyed by SHA-256 cache keys
//! - Atomic batch writes for install pre-warming
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod snapshots;

pub use crate::Error;

pub use connection::CacheDb;
pub use partitions::{PartitionInfo, PartitionName};
pub use snapshots::{ResponseSnapshot, Snapshot};
