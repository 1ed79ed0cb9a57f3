//! Install and activate transitions.
//!
//! Install fetches every pre-warm entry before writing anything and then
//! stores them in one transaction, so a version either has its complete
//! offline baseline or none of it. Activate deletes every partition the
//! current version does not own and claims interception immediately.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use stacks_core::cache::partitions::CORE_PARTITIONS;
use stacks_core::{Error, PartitionName, RequestDescriptor, Snapshot};
use tokio::sync::{Mutex, watch};

use crate::context::LayerContext;

/// Lifecycle phase of the running layer version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerPhase {
    /// Not yet installed.
    Idle,
    /// Pre-warm complete, waiting for activation.
    Installed,
    /// Intercepting requests; superseded partitions are gone.
    Active,
}

impl LayerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerPhase::Idle => "idle",
            LayerPhase::Installed => "installed",
            LayerPhase::Active => "active",
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub version: String,
    pub partitions: Vec<String>,
    pub prewarmed: usize,
}

/// Result of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub version: String,
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
}

/// Drives the install/activate signal pair for one layer version.
pub struct LifecycleManager {
    ctx: Arc<LayerContext>,
    phase: watch::Sender<LayerPhase>,
    activation: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        let (phase, _) = watch::channel(LayerPhase::Idle);
        Self { ctx, phase, activation: Mutex::new(()) }
    }

    pub fn phase(&self) -> LayerPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes, e.g. to learn when interception is claimed.
    pub fn subscribe(&self) -> watch::Receiver<LayerPhase> {
        self.phase.subscribe()
    }

    /// Create the core partitions and pre-warm them.
    ///
    /// # Errors
    ///
    /// `Error::PartialInstall` if any pre-warm entry fails to fetch or answers
    /// with a non-2xx status; nothing is written in that case.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let version = self.ctx.version().to_string();
        tracing::info!(%version, "installing layer");

        let mut jobs = Vec::new();
        for set in self.ctx.prewarm() {
            let partition = self.ctx.partition(&set.partition).to_string();
            for raw in &set.urls {
                jobs.push(self.prewarm_one(partition.clone(), raw));
            }
        }
        let total = jobs.len();
        let results = join_all(jobs).await;

        let mut snapshots = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                Err((url, reason)) => {
                    tracing::error!(%url, %reason, "pre-warm entry failed");
                    failed.push(url);
                }
            }
        }

        if !failed.is_empty() {
            tracing::error!(%version, failed = failed.len(), total, "install aborted, nothing stored");
            return Err(Error::PartialInstall { failed, total });
        }

        let core: Vec<PartitionName> = CORE_PARTITIONS
            .iter()
            .map(|logical| self.ctx.partition(logical))
            .collect();
        self.ctx.db.put_batch(&core, &snapshots).await?;

        let partitions = self.ctx.expected_partitions();

        self.phase.send_if_modified(|phase| {
            if *phase == LayerPhase::Idle {
                *phase = LayerPhase::Installed;
                true
            } else {
                false
            }
        });

        tracing::info!(%version, prewarmed = snapshots.len(), "layer installed");
        Ok(InstallReport { version, partitions, prewarmed: snapshots.len() })
    }

    async fn prewarm_one(&self, partition: String, raw: &str) -> Result<Snapshot, (String, String)> {
        let request = RequestDescriptor::get(raw);
        let url = self
            .ctx
            .resolve_url(raw)
            .map_err(|e| (raw.to_string(), e.to_string()))?;

        let response = self
            .ctx
            .origin
            .fetch(&request.method, &url, &request.headers)
            .await
            .map_err(|e| (raw.to_string(), e.to_string()))?;

        if !response.is_success() {
            return Err((raw.to_string(), format!("status {}", response.status)));
        }

        Ok(Snapshot {
            partition,
            key: self.ctx.cache_key(&request, &url),
            method: request.method.clone(),
            url: url.to_string(),
            request_headers: request.persistable_headers(),
            response: response.into_snapshot(),
        })
    }

    /// Delete superseded partitions and claim interception.
    ///
    /// Serialized against concurrent activations; safe to run while requests
    /// are being resolved (a resolve reading a deleted partition sees a miss).
    ///
    /// # Errors
    ///
    /// `Error::NotInstalled` if this version has not completed install.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.activation.lock().await;
        let version = self.ctx.version().to_string();

        if self.phase() == LayerPhase::Idle {
            tracing::error!(%version, "activation refused before a successful install");
            return Err(Error::NotInstalled(version));
        }

        let expected = self.ctx.expected_partitions();
        let mut kept = Vec::new();
        let mut deleted = Vec::new();

        for partition in self.ctx.db.list_partitions().await? {
            if expected.contains(&partition.name) {
                kept.push(partition.name);
                continue;
            }
            tracing::info!(partition = %partition.name, entries = partition.entries, "removing superseded partition");
            self.ctx.db.delete_partition(&partition.name).await?;
            deleted.push(partition.name);
        }

        self.phase.send_replace(LayerPhase::Active);
        tracing::info!(%version, kept = kept.len(), deleted = deleted.len(), "layer active");

        Ok(ActivationReport { version, kept, deleted })
    }
}
