//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STACKS_*)
//! 2. TOML config file (if STACKS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::partitions::{API, STATIC};

mod validation;

pub use validation::ConfigError;

/// URLs fetched into one core partition during install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmSet {
    /// Logical partition name (e.g. "static").
    pub partition: String,
    /// Request URLs, relative to `origin_url` or absolute on it.
    pub urls: Vec<String>,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STACKS_*)
/// 2. TOML config file (if STACKS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite partition store.
    ///
    /// Set via STACKS_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the library backend; relative request URLs resolve against it.
    ///
    /// Set via STACKS_ORIGIN_URL environment variable.
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via STACKS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Prefix of every partition name.
    ///
    /// Set via STACKS_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag of this layer; changing it supersedes all older partitions.
    ///
    /// Set via STACKS_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Entries fetched during install, grouped by partition.
    #[serde(default = "default_prewarm")]
    pub prewarm: Vec<PrewarmSet>,

    /// High-value URLs refreshed when connectivity returns.
    #[serde(default = "default_reconcile_urls")]
    pub reconcile_urls: Vec<String>,

    /// Request headers whose values take part in the cache key.
    ///
    /// Empty by default, so entries are keyed on method and URL only.
    #[serde(default)]
    pub vary_headers: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stacks-offline.sqlite")
}

fn default_origin_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_user_agent() -> String {
    "stacks-offline/0.1".into()
}

fn default_cache_prefix() -> String {
    "stacks".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_prewarm() -> Vec<PrewarmSet> {
    vec![
        PrewarmSet {
            partition: STATIC.into(),
            urls: [
                "/",
                "/pdf-reader.html",
                "/manifest.json",
                "/static/assets/library.png",
                "/static/styles/desktop-library.css",
                "/static/scripts/desktop-library.js",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        },
        PrewarmSet {
            partition: API.into(),
            urls: ["/api/categories", "/api/books/featured", "/api/books/offline-essentials"]
                .into_iter()
                .map(String::from)
                .collect(),
        },
    ]
}

fn default_reconcile_urls() -> Vec<String> {
    ["/api/categories", "/api/books/featured", "/api/books/offline-essentials"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin_url: default_origin_url(),
            user_agent: default_user_agent(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            prewarm: default_prewarm(),
            reconcile_urls: default_reconcile_urls(),
            vary_headers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STACKS_`
    /// 2. TOML file from `STACKS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STACKS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STACKS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Total number of pre-warm entries across all partitions.
    pub fn prewarm_len(&self) -> usize {
        self.prewarm.iter().map(|set| set.urls.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./stacks-offline.sqlite"));
        assert_eq!(config.user_agent, "stacks-offline/0.1");
        assert_eq!(config.cache_prefix, "stacks");
        assert_eq!(config.version, "v1");
        assert_eq!(config.reconcile_urls.len(), 3);
        assert!(config.vary_headers.is_empty());
    }

    #[test]
    fn test_default_prewarm_covers_app_shell() {
        let config = AppConfig::default();
        let static_set = config.prewarm.iter().find(|s| s.partition == STATIC).unwrap();
        assert!(static_set.urls.iter().any(|u| u == "/"));
        assert_eq!(config.prewarm_len(), 9);
    }

    #[test]
    fn test_load_from_toml_layer() {
        let toml = r#"
            version = "v2"
            origin_url = "https://library.example"
            reconcile_urls = ["/api/categories"]

            [[prewarm]]
            partition = "static"
            urls = ["/"]
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.version, "v2");
        assert_eq!(config.origin_url, "https://library.example");
        assert_eq!(config.reconcile_urls, vec!["/api/categories".to_string()]);
        assert_eq!(config.prewarm.len(), 1);
        assert_eq!(config.cache_prefix, "stacks");
        assert!(config.validate().is_ok());
    }
}
