//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::partitions::CORE_PARTITIONS;
use crate::config::AppConfig;
use reqwest::header::AUTHORIZATION;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn is_name_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin_url` is not an absolute http(s) URL
    /// - `cache_prefix` or `version` is empty or contains a separator
    /// - a pre-warm set names an unknown partition or an empty URL
    /// - `vary_headers` includes the credential header
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin_url)
            .map_err(|e| ConfigError::Invalid { field: "origin_url".into(), reason: e.to_string() })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "origin_url".into(),
                reason: format!("unsupported scheme: {}", origin.scheme()),
            });
        }

        // '-' separates prefix, logical name and version inside a partition name
        if !is_name_token(&self.cache_prefix) {
            return Err(ConfigError::Invalid {
                field: "cache_prefix".into(),
                reason: "must be non-empty and use only [A-Za-z0-9._]".into(),
            });
        }
        if !is_name_token(&self.version) {
            return Err(ConfigError::Invalid {
                field: "version".into(),
                reason: "must be non-empty and use only [A-Za-z0-9._]".into(),
            });
        }

        for set in &self.prewarm {
            if !CORE_PARTITIONS.contains(&set.partition.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "prewarm".into(),
                    reason: format!("unknown partition: {}", set.partition),
                });
            }
            if set.urls.iter().any(|u| u.trim().is_empty()) {
                return Err(ConfigError::Invalid { field: "prewarm".into(), reason: "empty URL".into() });
            }
        }

        if self.reconcile_urls.iter().any(|u| u.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "reconcile_urls".into(), reason: "empty URL".into() });
        }

        if self
            .vary_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(AUTHORIZATION.as_str()))
        {
            return Err(ConfigError::Invalid {
                field: "vary_headers".into(),
                reason: "credentials must never take part in the cache key".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.reconcile_urls.is_empty() {
            tracing::warn!("reconcile_urls is empty; connectivity restore will refresh nothing");
        }

        Ok(())
    }
}
