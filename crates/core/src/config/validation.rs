//! Configuration validation rules.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or `cache_prefix` is empty
    /// - `scope` is not an HTTP(S) URL
    /// - an app-shell entry does not resolve to an HTTP(S) URL
    /// - a host pattern is empty or not lower-case
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        let scope = self.scope_url()?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "scope".into(),
                reason: format!("unsupported scheme: {}", scope.scheme()),
            });
        }

        for url in self.app_shell_urls()? {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    field: "app_shell".into(),
                    reason: format!("{url}: unsupported scheme"),
                });
            }
        }

        for rule in &self.host_rules {
            if rule.patterns.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "host_rules".into(),
                    reason: format!("{:?} has no patterns", rule.class),
                });
            }
            for pattern in &rule.patterns {
                if pattern.is_empty() || pattern.chars().any(|c| c.is_ascii_uppercase()) {
                    return Err(ConfigError::Invalid {
                        field: "host_rules".into(),
                        reason: format!("pattern {pattern:?} must be non-empty and lower-case"),
                    });
                }
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.app_shell.is_empty() {
            tracing::warn!("app_shell is empty; install will pre-populate nothing");
        }

        Ok(())
    }
}
