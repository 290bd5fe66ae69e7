//! Worker configuration with layered loading.
//!
//! The worker deliberately reads no files and no environment: every value
//! has a built-in default, and the embedding host may layer programmatic
//! overrides on top. Layers are merged with figment:
//!
//! 1. [`ConfigOverrides`] supplied by the host
//! 2. Built-in defaults

use figment::{Figment, providers::Serialized};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Hostname classes with a dedicated caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostClass {
    /// Font and static-asset providers.
    StaticAssets,
    /// Realtime backend; session-bound traffic that is never cached.
    RealtimeBackend,
    /// External bibliographic-data API.
    BibliographicApi,
}

/// A host class together with the substrings that identify it.
///
/// A request belongs to the class when its hostname contains any pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRule {
    pub class: HostClass,
    pub patterns: Vec<String>,
}

impl HostRule {
    pub fn new(class: HostClass, patterns: &[&str]) -> Self {
        Self { class, patterns: patterns.iter().map(|p| p.to_string()).collect() }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Version tag. Bumping it discards every other cache generation on
    /// the next activation.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix of the generation name (`<prefix>-<version>`).
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin the worker serves; root-relative app-shell entries resolve
    /// against it.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// App shell manifest, absolute or root-relative.
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,

    /// Ordered hostname classification table.
    #[serde(default = "default_host_rules")]
    pub host_rules: Vec<HostRule>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of redirects the transport follows.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_version() -> String {
    "v4".into()
}

fn default_cache_prefix() -> String {
    "between-pages".into()
}

fn default_scope() -> String {
    "http://localhost/".into()
}

fn default_app_shell() -> Vec<String> {
    vec![
        "/".into(),
        "/index.html".into(),
        "/manifest.json".into(),
        "https://fonts.googleapis.com/css2?family=Courier+Prime:ital,wght@0,400;0,700;1,400&display=swap".into(),
        "https://cdn.jsdelivr.net/npm/@supabase/supabase-js@2".into(),
    ]
}

fn default_host_rules() -> Vec<HostRule> {
    vec![
        HostRule::new(HostClass::StaticAssets, &["googleapis.com", "gstatic.com"]),
        HostRule::new(HostClass::RealtimeBackend, &["supabase.co", "supabase.in"]),
        HostRule::new(HostClass::BibliographicApi, &["openlibrary.org"]),
    ]
}

fn default_user_agent() -> String {
    "pagekeep/0.1".into()
}

fn default_max_redirects() -> usize {
    5
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            scope: default_scope(),
            app_shell: default_app_shell(),
            host_rules: default_host_rules(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Host-supplied overrides. Unset fields keep the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_shell: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_rules: Option<Vec<HostRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,
}

impl ConfigOverrides {
    /// Overrides that only change the version tag.
    pub fn version(version: impl Into<String>) -> Self {
        Self { version: Some(version.into()), ..Default::default() }
    }
}

impl WorkerConfig {
    /// Built-in configuration, validated.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(ConfigOverrides::default())
    }

    /// Built-in configuration with `overrides` layered on top.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the layers cannot be merged or validation fails.
    pub fn load_with(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Parsed scope URL.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
    }

    /// App shell entries resolved to absolute URLs, in manifest order.
    pub fn app_shell_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let scope = self.scope_url()?;
        self.app_shell
            .iter()
            .map(|entry| {
                let mut url = scope.join(entry).map_err(|e| ConfigError::Invalid {
                    field: "app_shell".into(),
                    reason: format!("{entry}: {e}"),
                })?;
                url.set_fragment(None);
                Ok(url)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.version, "v4");
        assert_eq!(config.cache_name(), "between-pages-v4");
        assert_eq!(config.app_shell.len(), 5);
        assert_eq!(config.host_rules.len(), 3);
        assert_eq!(config.host_rules[0].class, HostClass::StaticAssets);
        assert_eq!(config.host_rules[1].class, HostClass::RealtimeBackend);
        assert_eq!(config.host_rules[2].class, HostClass::BibliographicApi);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_load_defaults() {
        let config = WorkerConfig::load().unwrap();
        assert_eq!(config.cache_name(), "between-pages-v4");
    }

    #[test]
    fn test_load_with_version_override() {
        let config = WorkerConfig::load_with(ConfigOverrides::version("v5")).unwrap();
        assert_eq!(config.cache_name(), "between-pages-v5");
        assert_eq!(config.app_shell, default_app_shell());
    }

    #[test]
    fn test_load_with_extra_host_pattern() {
        let mut rules = default_host_rules();
        rules[0].patterns.push("fonts.bunny.net".into());
        let overrides = ConfigOverrides { host_rules: Some(rules), ..Default::default() };

        let config = WorkerConfig::load_with(overrides).unwrap();
        assert_eq!(config.host_rules[0].patterns, vec!["googleapis.com", "gstatic.com", "fonts.bunny.net"]);
    }

    #[test]
    fn test_load_with_invalid_override() {
        let result = WorkerConfig::load_with(ConfigOverrides::version(""));
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_app_shell_urls_resolve_against_scope() {
        let config = WorkerConfig { scope: "https://journal.example/".into(), ..Default::default() };
        let urls = config.app_shell_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://journal.example/");
        assert_eq!(urls[1].as_str(), "https://journal.example/index.html");
        assert_eq!(urls[2].as_str(), "https://journal.example/manifest.json");
        assert_eq!(urls[3].host_str(), Some("fonts.googleapis.com"));
        assert_eq!(urls[4].as_str(), "https://cdn.jsdelivr.net/npm/@supabase/supabase-js@2");
    }
}
