//! Request classification.
//!
//! A single declarative [`RouteTable`] maps each category to its eligibility
//! predicate, fetch strategy, target partition and offline fallback. Entries
//! are tried in table order and the first match wins, so narrower patterns
//! (book PDFs under `/api/books/`) sit above broader ones (`/api/`).
//! Classification is a pure function of the table and the request.

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use stacks_core::Error;
use stacks_core::cache::partitions::{API, MEDIA_LARGE, STATIC, THUMBNAILS};

use crate::fetch::same_origin;

/// Category assigned to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteCategory {
    LargeMedia,
    Thumbnail,
    ApiData,
    StaticAsset,
    NavigationDocument,
    /// Bypasses the cache entirely.
    Uncategorized,
}

impl RouteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteCategory::LargeMedia => "large-media",
            RouteCategory::Thumbnail => "thumbnail",
            RouteCategory::ApiData => "api-data",
            RouteCategory::StaticAsset => "static-asset",
            RouteCategory::NavigationDocument => "navigation-document",
            RouteCategory::Uncategorized => "uncategorized",
        }
    }
}

impl std::fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a category is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Partition hit wins; the network is consulted only on a miss.
    CacheFirst,
    /// Network wins; the partition is a fallback for transport failures.
    NetworkFirst,
    /// Network-first, then the cached app shell, then a synthesized page.
    NavigationFallback,
}

/// Response synthesized when neither network nor cache can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Plain-text body with the given status.
    Text { status: u16, message: &'static str },
    /// 503 with `{"error":"offline","message":...}`.
    OfflineJson,
    /// Minimal renderable offline page.
    OfflineDocument,
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub category: RouteCategory,
    pub strategy: Strategy,
    /// Logical partition written and read by this category.
    pub partition: &'static str,
    pub fallback: Fallback,
    path: Regex,
    /// Matches regardless of path when the `Accept` header contains this.
    accept: Option<&'static str>,
}

impl RouteEntry {
    pub fn new(
        category: RouteCategory, strategy: Strategy, partition: &'static str, fallback: Fallback, path_pattern: &str,
    ) -> Result<Self, Error> {
        let path = Regex::new(path_pattern)
            .map_err(|e| Error::InvalidInput(format!("bad route pattern {path_pattern}: {e}")))?;
        Ok(Self { category, strategy, partition, fallback, path, accept: None })
    }

    /// Also match any request whose `Accept` header contains `content_type`.
    pub fn or_accepting(mut self, content_type: &'static str) -> Self {
        self.accept = Some(content_type);
        self
    }

    fn matches(&self, path: &str, accept: Option<&str>) -> bool {
        if self.path.is_match(path) {
            return true;
        }
        match (self.accept, accept) {
            (Some(wanted), Some(accept)) => accept.to_ascii_lowercase().contains(wanted),
            _ => false,
        }
    }
}

/// Ordered route table bound to the application origin.
#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: Url,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(origin: Url, entries: Vec<RouteEntry>) -> Self {
        Self { origin, entries }
    }

    /// The library application's routes.
    pub fn library(origin: Url) -> Result<Self, Error> {
        use RouteCategory::*;

        let entries = vec![
            RouteEntry::new(
                LargeMedia,
                Strategy::CacheFirst,
                MEDIA_LARGE,
                Fallback::Text { status: 503, message: "Media unavailable offline" },
                r"^/api/books/(.*/)?pdf$",
            )?,
            RouteEntry::new(
                Thumbnail,
                Strategy::CacheFirst,
                THUMBNAILS,
                Fallback::Text { status: 404, message: "Thumbnail unavailable" },
                r"^/api/thumbnails/",
            )?,
            RouteEntry::new(ApiData, Strategy::NetworkFirst, API, Fallback::OfflineJson, r"^/api/")?,
            RouteEntry::new(
                StaticAsset,
                Strategy::CacheFirst,
                STATIC,
                Fallback::Text { status: 404, message: "Resource unavailable offline" },
                r"(?i)^/static/|\.(css|js|png|ico|jpe?g|svg|webp|woff2?)$|^/manifest\.json$",
            )?,
            RouteEntry::new(
                NavigationDocument,
                Strategy::NavigationFallback,
                STATIC,
                Fallback::OfflineDocument,
                r"(?i)^/$|\.html?$",
            )?
            .or_accepting("text/html"),
        ];

        Ok(Self::new(origin, entries))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify a canonical request URL.
    ///
    /// Non-`GET` requests and requests to other origins are uncategorized.
    pub fn classify(&self, method: &str, url: &Url, accept: Option<&str>) -> RouteCategory {
        self.route(method, url, accept)
            .map_or(RouteCategory::Uncategorized, |entry| entry.category)
    }

    /// The first entry matching the request, if any.
    pub fn route(&self, method: &str, url: &Url, accept: Option<&str>) -> Option<&RouteEntry> {
        if !method.eq_ignore_ascii_case("GET") || !same_origin(&self.origin, url) {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.matches(url.path(), accept))
    }

    /// Entry for a category; None for `Uncategorized`.
    pub fn entry(&self, category: RouteCategory) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.category == category)
    }

    /// Distinct logical partitions referenced by the table.
    pub fn partitions(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.partition) {
                names.push(entry.partition);
            }
        }
        names
    }
}
