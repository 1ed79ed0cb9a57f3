//! Per-category fetch strategies.
//!
//! [`PolicyExecutor::resolve`] never fails: transport errors fall back to the
//! partition or to a synthesized response, and storage errors degrade to a
//! cache miss (reads) or an unstored response (writes). Concurrent resolves
//! of one key may both fetch and both write; the last write wins.

pub mod offline;

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use stacks_core::{PartitionName, RequestDescriptor, ResponseSnapshot, Snapshot};

use crate::context::LayerContext;
use crate::fetch::FetchResponse;
use crate::route::{RouteCategory, RouteEntry, Strategy};

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    /// Cache-first hit.
    Cache,
    /// Served from the partition after a failed network attempt.
    StaleCache,
    Synthesized,
    /// Uncategorized request forwarded untouched.
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::StaleCache => "stale-cache",
            ResponseSource::Synthesized => "synthesized",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

/// Outcome of resolving one request.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub category: RouteCategory,
    pub source: ResponseSource,
    pub response: ResponseSnapshot,
}

impl Resolution {
    fn new(category: RouteCategory, source: ResponseSource, response: ResponseSnapshot) -> Self {
        Self { category, source, response }
    }
}

/// Executes the route table's strategies against the partition store.
#[derive(Clone)]
pub struct PolicyExecutor {
    ctx: Arc<LayerContext>,
}

impl PolicyExecutor {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        Self { ctx }
    }

    /// Answer an intercepted request.
    pub async fn resolve(&self, request: &RequestDescriptor) -> Resolution {
        let url = match self.target_url(request) {
            Ok(url) => url,
            Err(rejected) => return rejected,
        };

        let Some(entry) = self.ctx.routes.route(&request.method, &url, request.accept()) else {
            return self.passthrough(request, &url).await;
        };

        let target = Target {
            entry,
            partition: self.ctx.partition(entry.partition),
            key: self.ctx.cache_key(request, &url),
            url: &url,
            request,
        };

        match entry.strategy {
            Strategy::CacheFirst => self.cache_first(&target).await,
            Strategy::NetworkFirst => self.network_first(&target).await,
            Strategy::NavigationFallback => self.navigation(&target).await,
        }
    }

    /// Send the request to the network without classifying it. No partition
    /// is read or written.
    pub async fn forward(&self, request: &RequestDescriptor) -> Resolution {
        match self.target_url(request) {
            Ok(url) => self.passthrough(request, &url).await,
            Err(rejected) => rejected,
        }
    }

    fn target_url(&self, request: &RequestDescriptor) -> Result<Url, Resolution> {
        self.ctx.resolve_url(&request.url).map_err(|e| {
            tracing::warn!(url = %request.url, error = %e, "rejecting unresolvable request URL");
            Resolution::new(
                RouteCategory::Uncategorized,
                ResponseSource::Synthesized,
                offline::plain_text(400, "Invalid request URL"),
            )
        })
    }

    async fn passthrough(&self, request: &RequestDescriptor, url: &Url) -> Resolution {
        let category = RouteCategory::Uncategorized;
        match self
            .ctx
            .origin
            .fetch(&request.method, url, &request.headers)
            .await
        {
            Ok(response) => Resolution::new(category, ResponseSource::Passthrough, response.into_snapshot()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "uncached request failed");
                Resolution::new(
                    category,
                    ResponseSource::Synthesized,
                    offline::plain_text(503, "Network unavailable"),
                )
            }
        }
    }

    async fn cache_first(&self, target: &Target<'_>) -> Resolution {
        let category = target.entry.category;
        if let Some(hit) = self.lookup(&target.partition, &target.key).await {
            tracing::debug!(url = %target.url, %category, "serving from cache");
            return Resolution::new(category, ResponseSource::Cache, hit.response);
        }

        match self.fetch(target).await {
            Some(response) => Resolution::new(category, ResponseSource::Network, self.capture(target, response).await),
            None => {
                tracing::warn!(url = %target.url, %category, "cache miss while offline, synthesizing");
                Resolution::new(category, ResponseSource::Synthesized, offline::synthesize(&target.entry.fallback))
            }
        }
    }

    async fn network_first(&self, target: &Target<'_>) -> Resolution {
        let category = target.entry.category;
        if let Some(response) = self.fetch(target).await {
            return Resolution::new(category, ResponseSource::Network, self.capture(target, response).await);
        }

        match self.lookup(&target.partition, &target.key).await {
            Some(stale) => {
                tracing::warn!(
                    url = %target.url,
                    %category,
                    captured_at = %stale.response.captured_at,
                    "network failed, serving stale snapshot"
                );
                Resolution::new(category, ResponseSource::StaleCache, stale.response)
            }
            None => {
                tracing::warn!(url = %target.url, %category, "network failed and nothing cached");
                Resolution::new(category, ResponseSource::Synthesized, offline::synthesize(&target.entry.fallback))
            }
        }
    }

    async fn navigation(&self, target: &Target<'_>) -> Resolution {
        let resolution = self.network_first(target).await;
        if resolution.source != ResponseSource::Synthesized {
            return resolution;
        }

        // total failure: fall back to the cached application shell before the placeholder
        let shell = match self.ctx.resolve_url("/") {
            Ok(shell_url) if shell_url != *target.url => {
                let shell_request = RequestDescriptor {
                    method: "GET".into(),
                    url: shell_url.to_string(),
                    headers: target.request.headers.clone(),
                };
                let key = self.ctx.cache_key(&shell_request, &shell_url);
                self.lookup(&target.partition, &key).await
            }
            _ => None,
        };

        match shell {
            Some(shell) => {
                tracing::warn!(url = %target.url, "serving cached app shell for offline navigation");
                Resolution::new(target.entry.category, ResponseSource::StaleCache, shell.response)
            }
            None => resolution,
        }
    }

    /// Network attempt; None on transport failure.
    async fn fetch(&self, target: &Target<'_>) -> Option<FetchResponse> {
        match self
            .ctx
            .origin
            .fetch(&target.request.method, target.url, &target.request.headers)
            .await
        {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!(url = %target.url, error = %e, "network fetch failed");
                None
            }
        }
    }

    /// Store a successful response, then hand it back.
    async fn capture(&self, target: &Target<'_>, response: FetchResponse) -> ResponseSnapshot {
        let cacheable = response.is_success();
        let snapshot = response.into_snapshot();
        if cacheable {
            self.store(target, &snapshot).await;
        } else {
            tracing::debug!(url = %target.url, status = snapshot.status, "not caching unsuccessful response");
        }
        snapshot
    }

    async fn lookup(&self, partition: &PartitionName, key: &str) -> Option<Snapshot> {
        match self.ctx.db.get_snapshot(&partition.to_string(), key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(%partition, error = %e, "partition read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, target: &Target<'_>, response: &ResponseSnapshot) {
        let snapshot = Snapshot {
            partition: target.partition.to_string(),
            key: target.key.clone(),
            method: target.request.method.clone(),
            url: target.url.to_string(),
            request_headers: target.request.persistable_headers(),
            response: response.clone(),
        };
        if let Err(e) = self.ctx.db.put_snapshot(&snapshot).await {
            tracing::warn!(partition = %snapshot.partition, url = %target.url, error = %e, "failed to store snapshot");
        }
    }
}

/// A classified request bound to its partition and key.
struct Target<'a> {
    entry: &'a RouteEntry,
    partition: PartitionName,
    key: String,
    url: &'a Url,
    request: &'a RequestDescriptor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOrigin, test_config, test_context};
    use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
    use std::time::Duration;
    use stacks_core::AppConfig;

    fn html() -> HeaderValue {
        HeaderValue::from_static("text/html")
    }

    async fn executor(origin: &Arc<ScriptedOrigin>) -> (PolicyExecutor, Arc<LayerContext>) {
        let ctx = test_context(&test_config(), origin.clone()).await;
        (PolicyExecutor::new(ctx.clone()), ctx)
    }

    async fn stored(ctx: &LayerContext, logical: &str, url: &str) -> Option<Snapshot> {
        let request = RequestDescriptor::get(url);
        let resolved = ctx.resolve_url(url).unwrap();
        let key = ctx.cache_key(&request, &resolved);
        ctx.db
            .get_snapshot(&ctx.partition(logical).to_string(), &key)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/thumbnails/7.png", 200, "image/png", "png-bytes");
        let (executor, _) = executor(&origin).await;
        let request = RequestDescriptor::get("/api/thumbnails/7.png");

        let first = executor.resolve(&request).await;
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(first.category, RouteCategory::Thumbnail);

        let second = executor.resolve(&request).await;
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, b"png-bytes");
        assert_eq!(origin.calls("/api/thumbnails/7.png"), 1);
    }

    #[tokio::test]
    async fn test_stored_snapshot_round_trips_offline() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/books/9/pdf", 200, "application/pdf", "%PDF-1.7 body");
        let (executor, _) = executor(&origin).await;
        let request = RequestDescriptor::get("/api/books/9/pdf");

        let fetched = executor.resolve(&request).await;
        origin.set_offline(true);
        let replayed = executor.resolve(&request).await;

        assert_eq!(replayed.source, ResponseSource::Cache);
        assert_eq!(replayed.response, fetched.response);
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_synthesizes() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (executor, _) = executor(&origin).await;

        let pdf = executor.resolve(&RequestDescriptor::get("/api/books/1/pdf")).await;
        assert_eq!(pdf.source, ResponseSource::Synthesized);
        assert_eq!(pdf.response.status, 503);
        assert_eq!(pdf.response.content_type(), Some("text/plain; charset=utf-8"));

        let thumb = executor.resolve(&RequestDescriptor::get("/api/thumbnails/1.png")).await;
        assert_eq!(thumb.response.status, 404);

        let css = executor.resolve(&RequestDescriptor::get("/static/app.css")).await;
        assert_eq!(css.response.status, 404);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/static/missing.css", 404, "text/plain", "nope");
        let (executor, ctx) = executor(&origin).await;

        let resolution = executor.resolve(&RequestDescriptor::get("/static/missing.css")).await;
        assert_eq!(resolution.source, ResponseSource::Network);
        assert_eq!(resolution.response.status, 404);
        assert!(stored(&ctx, "static", "/static/missing.css").await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_updates_partition() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/categories", 200, "application/json", r#"["fiction"]"#);
        let (executor, ctx) = executor(&origin).await;
        let request = RequestDescriptor::get("/api/categories");

        executor.resolve(&request).await;
        origin.respond("/api/categories", 200, "application/json", r#"["fiction","history"]"#);
        let resolution = executor.resolve(&request).await;

        assert_eq!(resolution.source, ResponseSource::Network);
        assert_eq!(resolution.response.body, br#"["fiction","history"]"#);
        let snapshot = stored(&ctx, "api", "/api/categories").await.unwrap();
        assert_eq!(snapshot.response, resolution.response);
        assert_eq!(origin.calls("/api/categories"), 2);
    }

    #[tokio::test]
    async fn test_network_first_serves_stale_on_failure() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/books/featured", 200, "application/json", "[1,2,3]");
        let (executor, ctx) = executor(&origin).await;
        let request = RequestDescriptor::get("/api/books/featured");

        let fresh = executor.resolve(&request).await;
        origin.fail("/api/books/featured");
        let stale = executor.resolve(&request).await;

        assert_eq!(stale.source, ResponseSource::StaleCache);
        assert_eq!(stale.response, fresh.response);
        assert_eq!(stored(&ctx, "api", "/api/books/featured").await.unwrap().response, fresh.response);
    }

    #[tokio::test]
    async fn test_network_first_offline_without_cache() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (executor, _) = executor(&origin).await;

        let resolution = executor.resolve(&RequestDescriptor::get("/api/categories")).await;
        assert_eq!(resolution.source, ResponseSource::Synthesized);
        assert_eq!(resolution.response.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&resolution.response.body).unwrap();
        assert_eq!(body["error"], "offline");
    }

    #[tokio::test]
    async fn test_network_first_passes_error_status_through() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/books/404", 404, "application/json", r#"{"detail":"missing"}"#);
        let (executor, ctx) = executor(&origin).await;

        let resolution = executor.resolve(&RequestDescriptor::get("/api/books/404")).await;
        assert_eq!(resolution.source, ResponseSource::Network);
        assert_eq!(resolution.response.status, 404);
        assert!(stored(&ctx, "api", "/api/books/404").await.is_none());
    }

    #[tokio::test]
    async fn test_credentials_not_persisted() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/categories", 200, "application/json", "[]");
        let (executor, ctx) = executor(&origin).await;

        let request = RequestDescriptor::get("/api/categories")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"))
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));
        executor.resolve(&request).await;

        let snapshot = stored(&ctx, "api", "/api/categories").await.unwrap();
        assert!(!snapshot.request_headers.contains_key(AUTHORIZATION));
        assert_eq!(snapshot.request_headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_concurrent_network_first_same_key() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond_counting("/api/books/featured");
        let (executor, ctx) = executor(&origin).await;
        let request = RequestDescriptor::get("/api/books/featured");

        let (a, b) = tokio::join!(executor.resolve(&request), executor.resolve(&request));
        assert_eq!(a.source, ResponseSource::Network);
        assert_eq!(b.source, ResponseSource::Network);
        assert_eq!(origin.calls("/api/books/featured"), 2);

        let snapshot = stored(&ctx, "api", "/api/books/featured").await.unwrap();
        assert!(snapshot.response == a.response || snapshot.response == b.response);
    }

    #[tokio::test]
    async fn test_navigation_falls_back_to_cached_page() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/pdf-reader.html", 200, "text/html", "<html>reader</html>");
        let (executor, _) = executor(&origin).await;
        let request = RequestDescriptor::get("/pdf-reader.html");

        executor.resolve(&request).await;
        origin.set_offline(true);
        let resolution = executor.resolve(&request).await;

        assert_eq!(resolution.source, ResponseSource::StaleCache);
        assert_eq!(resolution.response.body, b"<html>reader</html>");
    }

    #[tokio::test]
    async fn test_navigation_falls_back_to_app_shell() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/", 200, "text/html", "<html>shell</html>");
        let (executor, _) = executor(&origin).await;

        executor.resolve(&RequestDescriptor::get("/")).await;
        origin.set_offline(true);
        let resolution = executor.resolve(&RequestDescriptor::get("/never-visited.html")).await;

        assert_eq!(resolution.category, RouteCategory::NavigationDocument);
        assert_eq!(resolution.source, ResponseSource::StaleCache);
        assert_eq!(resolution.response.body, b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_app_shell_lookup_uses_vary_headers() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/", 200, "text/html", "<html>shell</html>");
        let config = AppConfig { vary_headers: vec!["accept".into()], ..test_config() };
        let executor = PolicyExecutor::new(test_context(&config, origin.clone()).await);

        executor
            .resolve(&RequestDescriptor::get("/").with_header(ACCEPT, html()))
            .await;
        origin.set_offline(true);

        let resolution = executor
            .resolve(&RequestDescriptor::get("/never-visited.html").with_header(ACCEPT, html()))
            .await;
        assert_eq!(resolution.source, ResponseSource::StaleCache);
        assert_eq!(resolution.response.body, b"<html>shell</html>");

        // the shell was stored for text/html only
        let json = executor
            .resolve(
                &RequestDescriptor::get("/other.html").with_header(ACCEPT, HeaderValue::from_static("application/json")),
            )
            .await;
        assert_eq!(json.source, ResponseSource::Synthesized);
    }

    #[tokio::test]
    async fn test_dropped_resolve_stores_nothing() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.hang("/api/books/3/pdf");
        let (executor, ctx) = executor(&origin).await;

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), executor.resolve(&RequestDescriptor::get("/api/books/3/pdf")))
                .await;
        assert!(outcome.is_err());
        assert_eq!(origin.calls("/api/books/3/pdf"), 1);
        assert!(stored(&ctx, "media-large", "/api/books/3/pdf").await.is_none());
        assert!(ctx.db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forward_never_touches_partitions() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/static/app.css", 200, "text/css", "body{}");
        let (executor, ctx) = executor(&origin).await;

        let resolution = executor.forward(&RequestDescriptor::get("/static/app.css")).await;
        assert_eq!(resolution.category, RouteCategory::Uncategorized);
        assert_eq!(resolution.source, ResponseSource::Passthrough);
        assert_eq!(resolution.response.body, b"body{}");
        assert!(ctx.db.list_partitions().await.unwrap().is_empty());

        let bad = executor.forward(&RequestDescriptor::get("   ")).await;
        assert_eq!(bad.response.status, 400);
    }

    #[tokio::test]
    async fn test_navigation_synthesizes_document() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (executor, _) = executor(&origin).await;

        let resolution = executor
            .resolve(&RequestDescriptor::get("/library").with_header(ACCEPT, html()))
            .await;

        assert_eq!(resolution.source, ResponseSource::Synthesized);
        assert_eq!(resolution.response.status, 200);
        assert!(String::from_utf8_lossy(&resolution.response.body).contains("offline"));
    }

    #[tokio::test]
    async fn test_uncategorized_bypasses_cache() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/health", 200, "text/plain", "ok");
        let (executor, ctx) = executor(&origin).await;

        let resolution = executor.resolve(&RequestDescriptor::get("/health")).await;
        assert_eq!(resolution.category, RouteCategory::Uncategorized);
        assert_eq!(resolution.source, ResponseSource::Passthrough);
        assert!(ctx.db.list_partitions().await.unwrap().is_empty());

        origin.set_offline(true);
        let offline = executor.resolve(&RequestDescriptor::get("/health")).await;
        assert_eq!(offline.source, ResponseSource::Synthesized);
        assert_eq!(offline.response.status, 503);
    }

    #[tokio::test]
    async fn test_post_never_cached() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/books/1/progress", 200, "application/json", "{}");
        let (executor, ctx) = executor(&origin).await;

        let resolution = executor
            .resolve(&RequestDescriptor::new("POST", "/api/books/1/progress"))
            .await;
        assert_eq!(resolution.category, RouteCategory::Uncategorized);
        assert!(ctx.db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_partition_reads_as_miss() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/static/app.js", 200, "text/javascript", "v1");
        let (executor, ctx) = executor(&origin).await;
        let request = RequestDescriptor::get("/static/app.js");

        executor.resolve(&request).await;
        ctx.db
            .delete_partition(&ctx.partition("static").to_string())
            .await
            .unwrap();
        origin.respond("/static/app.js", 200, "text/javascript", "v2");

        let resolution = executor.resolve(&request).await;
        assert_eq!(resolution.source, ResponseSource::Network);
        assert_eq!(resolution.response.body, b"v2");
    }

    #[tokio::test]
    async fn test_invalid_url_is_answered() {
        let origin = Arc::new(ScriptedOrigin::new());
        let (executor, _) = executor(&origin).await;

        let resolution = executor.resolve(&RequestDescriptor::get("   ")).await;
        assert_eq!(resolution.response.status, 400);
        assert_eq!(origin.total_calls(), 0);
    }
}
