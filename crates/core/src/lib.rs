//! Core types and shared functionality for the stacks offline layer.
//!
//! This crate provides:
//! - Versioned cache partitions with a SQLite backend
//! - Request descriptors and response snapshots
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, PartitionInfo, PartitionName, ResponseSnapshot, Snapshot};
pub use config::{AppConfig, ConfigError, PrewarmSet};
pub use error::Error;
pub use request::RequestDescriptor;
