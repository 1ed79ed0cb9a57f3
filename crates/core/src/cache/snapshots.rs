//! Snapshot storage within partitions.
//!
//! A stored entry pairs the request that produced it (credentials removed)
//! with the captured response. Writes replace any previous entry for the
//! same `(partition, key)` wholesale; there is no merging.

use super::connection::CacheDb;
use super::partitions::PartitionName;
use crate::Error;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Row};

/// A captured response. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// RFC 3339 capture time.
    pub captured_at: String,
}

impl ResponseSnapshot {
    /// Snapshot captured now.
    pub fn now(status: u16, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers, body: body.into(), captured_at: chrono::Utc::now().to_rfc3339() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// A stored partition entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Full partition name, e.g. `stacks-api-v1`.
    pub partition: String,
    pub key: String,
    pub method: String,
    /// Canonical absolute URL.
    pub url: String,
    /// Request headers without credentials.
    pub request_headers: HeaderMap,
    pub response: ResponseSnapshot,
}

/// One header as stored in `*_headers_json`: `value` for visible ASCII,
/// `hex` for any other bytes.
#[derive(Serialize, Deserialize)]
struct StoredHeader {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hex: Option<String>,
}

/// Encode headers for storage, keeping repeats and opaque values.
fn encode_headers(headers: &HeaderMap) -> Result<String, Error> {
    let stored: Vec<StoredHeader> = headers
        .iter()
        .map(|(name, value)| match value.to_str() {
            Ok(text) => StoredHeader { name: name.as_str().to_string(), value: Some(text.to_string()), hex: None },
            Err(_) => StoredHeader { name: name.as_str().to_string(), value: None, hex: Some(hex::encode(value.as_bytes())) },
        })
        .collect();
    Ok(serde_json::to_string(&stored)?)
}

fn decode_headers(json: &str) -> Result<HeaderMap, Error> {
    let stored: Vec<StoredHeader> = serde_json::from_str(json)?;
    let mut headers = HeaderMap::with_capacity(stored.len());
    for header in stored {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| Error::CorruptHeaders(format!("{}: {e}", header.name)))?;
        let value = match (header.value, header.hex) {
            (Some(text), _) => HeaderValue::from_str(&text).map_err(|e| Error::CorruptHeaders(format!("{name}: {e}")))?,
            (None, Some(encoded)) => {
                let bytes = hex::decode(&encoded).map_err(|e| Error::CorruptHeaders(format!("{name}: {e}")))?;
                HeaderValue::from_bytes(&bytes).map_err(|e| Error::CorruptHeaders(format!("{name}: {e}")))?
            }
            (None, None) => return Err(Error::CorruptHeaders(format!("{name}: no value"))),
        };
        headers.append(name, value);
    }
    Ok(headers)
}

const SELECT_COLUMNS: &str = "partition, key, method, url, request_headers_json, status, headers_json, body, captured_at";

type RawRow = (String, String, String, String, String, u16, String, Vec<u8>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode(raw: RawRow) -> Result<Snapshot, Error> {
    let (partition, key, method, url, request_headers_json, status, headers_json, body, captured_at) = raw;
    Ok(Snapshot {
        partition,
        key,
        method,
        url,
        request_headers: decode_headers(&request_headers_json)?,
        response: ResponseSnapshot { status, headers: decode_headers(&headers_json)?, body, captured_at },
    })
}

fn insert(tx: &rusqlite::Transaction<'_>, snapshot: &Snapshot) -> Result<(), Error> {
    let name = PartitionName::parse(&snapshot.partition)
        .ok_or_else(|| Error::InvalidInput(format!("malformed partition name: {}", snapshot.partition)))?;
    tx.execute(
        "INSERT OR IGNORE INTO partitions (name, logical, version, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&snapshot.partition, name.logical, name.version, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.execute(
        "INSERT INTO entries (
            partition, key, method, url, request_headers_json,
            status, headers_json, body, captured_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(partition, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            request_headers_json = excluded.request_headers_json,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            captured_at = excluded.captured_at",
        params![
            &snapshot.partition,
            &snapshot.key,
            &snapshot.method,
            &snapshot.url,
            encode_headers(&snapshot.request_headers)?,
            snapshot.response.status,
            encode_headers(&snapshot.response.headers)?,
            &snapshot.response.body,
            &snapshot.response.captured_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store a snapshot, creating its partition on first write.
    ///
    /// Replaces any existing entry for the same partition and key.
    pub async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), Error> {
        self.put_snapshots(std::slice::from_ref(snapshot)).await
    }

    /// Store several snapshots in one transaction: all of them or none.
    pub async fn put_snapshots(&self, snapshots: &[Snapshot]) -> Result<(), Error> {
        self.put_batch(&[], snapshots).await
    }

    /// Create `partitions` and store `snapshots` in one transaction.
    ///
    /// Either every partition row and every entry is written, or nothing is.
    pub async fn put_batch(&self, partitions: &[PartitionName], snapshots: &[Snapshot]) -> Result<(), Error> {
        let partitions = partitions.to_vec();
        let snapshots = snapshots.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let created_at = chrono::Utc::now().to_rfc3339();
                for name in &partitions {
                    tx.execute(
                        "INSERT OR IGNORE INTO partitions (name, logical, version, created_at) VALUES (?1, ?2, ?3, ?4)",
                        params![name.to_string(), name.logical, name.version, created_at],
                    )?;
                }
                for snapshot in &snapshots {
                    insert(&tx, snapshot)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by partition and key.
    ///
    /// Returns None if either the partition or the key does not exist.
    pub async fn get_snapshot(&self, partition: &str, key: &str) -> Result<Option<Snapshot>, Error> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM entries WHERE partition = ?1 AND key = ?2");
                let raw = conn
                    .query_row(&sql, params![partition, key], read_row)
                    .optional()?;
                raw.map(decode).transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Every entry stored under `key`, in any partition, newest first.
    pub async fn find_snapshots(&self, key: &str) -> Result<Vec<Snapshot>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<Snapshot>, Error> {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM entries WHERE key = ?1 ORDER BY captured_at DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![key], read_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(decode).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose URL contains `pattern`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_by_url(&self, pattern: &str) -> Result<u64, Error> {
        let pattern = format!("%{pattern}%");
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE url LIKE ?1", params![pattern])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge the oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_oldest_entries(&self, max_entries: usize) -> Result<u64, Error> {
        // counts above i64::MAX keep everything
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                        SELECT rowid FROM entries ORDER BY captured_at ASC LIMIT ?1
                    )",
                    params![count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
