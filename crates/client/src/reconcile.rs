//! Background refresh of the reconciliation set.
//!
//! Triggered by a connectivity-restored signal. Every entry is fetched
//! independently; a failure leaves that entry's previous snapshot alone and
//! is reported, not retried.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use stacks_core::{RequestDescriptor, Snapshot};

use crate::context::LayerContext;

/// Outcome of refreshing one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ReconcileOutcome {
    Refreshed { url: String, partition: String },
    Failed { url: String, reason: String },
}

impl ReconcileOutcome {
    pub fn url(&self) -> &str {
        match self {
            ReconcileOutcome::Refreshed { url, .. } | ReconcileOutcome::Failed { url, .. } => url,
        }
    }

    pub fn is_refreshed(&self) -> bool {
        matches!(self, ReconcileOutcome::Refreshed { .. })
    }
}

/// Per-entry results, in reconciliation-set order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileReport {
    pub fn refreshed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_refreshed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.refreshed()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Some entries refreshed, some failed.
    pub fn is_partial(&self) -> bool {
        self.refreshed() > 0 && self.failed() > 0
    }
}

/// Refreshes the reconciliation set outside the request path.
#[derive(Clone)]
pub struct Reconciler {
    ctx: Arc<LayerContext>,
}

impl Reconciler {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        Self { ctx }
    }

    /// Fetch every entry concurrently and store the successful ones.
    pub async fn run(&self) -> ReconcileReport {
        let set = self.ctx.reconciliation_set();
        tracing::info!(entries = set.len(), "connectivity restored, reconciling");

        let outcomes = join_all(set.iter().map(|request| self.refresh(request))).await;
        let report = ReconcileReport { outcomes };

        if report.is_complete() {
            tracing::info!(refreshed = report.refreshed(), "reconciliation complete");
        } else {
            tracing::warn!(
                refreshed = report.refreshed(),
                failed = report.failed(),
                "reconciliation finished with failures"
            );
        }
        report
    }

    async fn refresh(&self, request: &RequestDescriptor) -> ReconcileOutcome {
        let failed = |reason: String| {
            tracing::warn!(url = %request.url, %reason, "reconciliation entry failed");
            ReconcileOutcome::Failed { url: request.url.clone(), reason }
        };

        let url = match self.ctx.resolve_url(&request.url) {
            Ok(url) => url,
            Err(e) => return failed(e.to_string()),
        };
        let Some(entry) = self.ctx.routes.route(&request.method, &url, request.accept()) else {
            return failed("request is not cacheable".into());
        };

        let response = match self
            .ctx
            .origin
            .fetch(&request.method, &url, &request.headers)
            .await
        {
            Ok(response) if response.is_success() => response,
            Ok(response) => return failed(format!("status {}", response.status)),
            Err(e) => return failed(e.to_string()),
        };

        let snapshot = Snapshot {
            partition: self.ctx.partition(entry.partition).to_string(),
            key: self.ctx.cache_key(request, &url),
            method: request.method.clone(),
            url: url.to_string(),
            request_headers: request.persistable_headers(),
            response: response.into_snapshot(),
        };
        if let Err(e) = self.ctx.db.put_snapshot(&snapshot).await {
            return failed(e.to_string());
        }

        tracing::debug!(url = %url, partition = %snapshot.partition, "reconciled");
        ReconcileOutcome::Refreshed { url: request.url.clone(), partition: snapshot.partition }
    }
}
