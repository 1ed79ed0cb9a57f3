//! Versioned partition management.
//!
//! A partition is named `<prefix>-<logical>-<version>`. Prefix and version
//! never contain `-` (enforced by config validation), so the logical part can
//! (`media-large`) and the name still parses unambiguously.

use std::fmt;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Application shell, static assets and navigation documents.
pub const STATIC: &str = "static";
/// API responses served network-first.
pub const API: &str = "api";
/// Book cover thumbnails.
pub const THUMBNAILS: &str = "thumbnails";
/// Large media such as book PDFs.
pub const MEDIA_LARGE: &str = "media-large";

/// Every logical partition a layer version owns.
pub const CORE_PARTITIONS: &[&str] = &[STATIC, API, THUMBNAILS, MEDIA_LARGE];

/// Fully qualified partition name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionName {
    pub prefix: String,
    pub logical: String,
    pub version: String,
}

impl PartitionName {
    pub fn new(prefix: &str, logical: &str, version: &str) -> Self {
        Self { prefix: prefix.to_string(), logical: logical.to_string(), version: version.to_string() }
    }

    /// Split a stored name back into its parts.
    ///
    /// Returns None for names that do not follow the `<prefix>-<logical>-<version>` shape.
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, rest) = name.split_once('-')?;
        let (logical, version) = rest.rsplit_once('-')?;
        if prefix.is_empty() || logical.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(prefix, logical, version))
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.prefix, self.logical, self.version)
    }
}

/// A partition as recorded in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionInfo {
    pub name: String,
    pub logical: String,
    pub version: String,
    pub created_at: String,
    pub entries: i64,
}

impl CacheDb {
    /// Create the partition if it does not exist yet.
    pub async fn ensure_partition(&self, name: &PartitionName) -> Result<(), Error> {
        let (full, logical, version) = (name.to_string(), name.logical.clone(), name.version.clone());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, logical, version, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![full, logical, version, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List every partition with its entry count, ordered by name.
    pub async fn list_partitions(&self) -> Result<Vec<PartitionInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, p.logical, p.version, p.created_at,
                            (SELECT COUNT(*) FROM entries e WHERE e.partition = p.name)
                     FROM partitions p ORDER BY p.name",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(PartitionInfo {
                        name: row.get(0)?,
                        logical: row.get(1)?,
                        version: row.get(2)?,
                        created_at: row.get(3)?,
                        entries: row.get(4)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>().map_err(Error::from)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns false if the partition did not exist.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
