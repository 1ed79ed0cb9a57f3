//! Offline interception layer for the stacks library app.
//!
//! This crate provides the route table, fetch strategies, install/activate
//! lifecycle and background reconciliation, all sitting on the partition
//! store from `stacks-core`.

pub mod context;
pub mod fetch;
pub mod layer;
pub mod lifecycle;
pub mod policy;
pub mod reconcile;
pub mod route;

#[cfg(test)]
mod testing;

pub use context::LayerContext;
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Origin};
pub use layer::{InterceptionHandler, OfflineLayer};
pub use lifecycle::{ActivationReport, InstallReport, LayerPhase, LifecycleManager};
pub use policy::{PolicyExecutor, Resolution, ResponseSource};
pub use reconcile::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use route::{Fallback, RouteCategory, RouteTable, Strategy};
