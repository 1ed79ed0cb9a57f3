//! Host-facing interception boundary.
//!
//! [`InterceptionHandler`] is the signal surface a host runtime drives:
//! install and activate for version changes, resolve for every intercepted
//! request, connectivity-restored for reconciliation. [`OfflineLayer`] is the
//! implementation over one [`LayerContext`].

use std::sync::Arc;

use async_trait::async_trait;
use stacks_core::{AppConfig, CacheDb, Error, RequestDescriptor};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::context::LayerContext;
use crate::fetch::{FetchClient, FetchConfig};
use crate::lifecycle::{ActivationReport, InstallReport, LayerPhase, LifecycleManager};
use crate::policy::{PolicyExecutor, Resolution};
use crate::reconcile::{ReconcileReport, Reconciler};

/// Signals a host delivers to the offline layer.
#[async_trait]
pub trait InterceptionHandler: Send + Sync {
    async fn on_install(&self) -> Result<InstallReport, Error>;

    async fn on_activate(&self) -> Result<ActivationReport, Error>;

    /// Answer an intercepted request. Never fails.
    ///
    /// Until activation the request goes straight to the network and no
    /// partition is read or written.
    async fn resolve(&self, request: &RequestDescriptor) -> Resolution;

    async fn on_connectivity_restored(&self) -> ReconcileReport;
}

/// The offline layer for one configured version.
pub struct OfflineLayer {
    ctx: Arc<LayerContext>,
    executor: PolicyExecutor,
    lifecycle: LifecycleManager,
    reconciler: Reconciler,
}

impl OfflineLayer {
    pub fn new(ctx: LayerContext) -> Self {
        let ctx = Arc::new(ctx);
        Self {
            executor: PolicyExecutor::new(ctx.clone()),
            lifecycle: LifecycleManager::new(ctx.clone()),
            reconciler: Reconciler::new(ctx.clone()),
            ctx,
        }
    }

    /// Open the store at `db_path` and build an HTTP origin from `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        let origin = FetchClient::new(FetchConfig { user_agent: config.user_agent.clone(), ..Default::default() })?;
        let ctx = LayerContext::new(config, db, Arc::new(origin))?;

        tracing::info!(
            origin = %ctx.routes.origin(),
            version = ctx.version(),
            db_path = %config.db_path.display(),
            "offline layer ready"
        );
        Ok(Self::new(ctx))
    }

    pub fn context(&self) -> &LayerContext {
        &self.ctx
    }

    pub fn phase(&self) -> LayerPhase {
        self.lifecycle.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<LayerPhase> {
        self.lifecycle.subscribe()
    }

    /// Run reconciliation on its own task so the caller is never blocked.
    pub fn spawn_reconciliation(&self) -> JoinHandle<ReconcileReport> {
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move { reconciler.run().await })
    }
}

#[async_trait]
impl InterceptionHandler for OfflineLayer {
    async fn on_install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.install().await
    }

    async fn on_activate(&self) -> Result<ActivationReport, Error> {
        self.lifecycle.activate().await
    }

    async fn resolve(&self, request: &RequestDescriptor) -> Resolution {
        if self.phase() != LayerPhase::Active {
            return self.executor.forward(request).await;
        }
        self.executor.resolve(request).await
    }

    async fn on_connectivity_restored(&self) -> ReconcileReport {
        self.reconciler.run().await
    }
}
