//! Explicit layer context.
//!
//! Everything the policy executor, lifecycle manager and reconciler need is
//! built once from [`AppConfig`] and shared behind an `Arc`; there is no
//! process-wide state.

use std::sync::Arc;

use reqwest::Url;
use stacks_core::cache::hash::{compute_cache_key, vary_component};
use stacks_core::cache::partitions::CORE_PARTITIONS;
use stacks_core::{AppConfig, CacheDb, Error, PartitionName, PrewarmSet, RequestDescriptor};

use crate::fetch::{Origin, canonicalize};
use crate::route::RouteTable;

/// Shared, immutable configuration of one layer version.
pub struct LayerContext {
    pub db: CacheDb,
    pub origin: Arc<dyn Origin>,
    pub routes: RouteTable,
    prefix: String,
    version: String,
    prewarm: Vec<PrewarmSet>,
    reconcile: Vec<RequestDescriptor>,
    vary_headers: Vec<String>,
}

impl LayerContext {
    /// Build a context from validated configuration.
    pub fn new(config: &AppConfig, db: CacheDb, origin: Arc<dyn Origin>) -> Result<Self, Error> {
        config
            .validate()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let origin_url = Url::parse(&config.origin_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let routes = RouteTable::library(origin_url)?;

        Ok(Self {
            db,
            origin,
            routes,
            prefix: config.cache_prefix.clone(),
            version: config.version.clone(),
            prewarm: config.prewarm.clone(),
            reconcile: config
                .reconcile_urls
                .iter()
                .map(RequestDescriptor::get)
                .collect(),
            vary_headers: config.vary_headers.clone(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn partition(&self, logical: &str) -> PartitionName {
        PartitionName::new(&self.prefix, logical, &self.version)
    }

    /// Full names of every partition this version owns.
    pub fn expected_partitions(&self) -> Vec<String> {
        let mut names: Vec<String> = CORE_PARTITIONS
            .iter()
            .map(|logical| self.partition(logical).to_string())
            .collect();
        for logical in self.routes.partitions() {
            let name = self.partition(logical).to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn prewarm(&self) -> &[PrewarmSet] {
        &self.prewarm
    }

    pub fn reconciliation_set(&self) -> &[RequestDescriptor] {
        &self.reconcile
    }

    /// Canonical absolute URL of a request.
    pub fn resolve_url(&self, raw: &str) -> Result<Url, Error> {
        canonicalize(self.routes.origin(), raw).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Cache key of a request whose URL is already resolved.
    pub fn cache_key(&self, request: &RequestDescriptor, url: &Url) -> String {
        compute_cache_key(&request.method, url.as_str(), &vary_component(request, &self.vary_headers))
    }
}
