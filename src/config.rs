//! Content layer configuration.
//!
//! Handles loading, validating, and merging `groundwork.toml`. Stock defaults
//! are serialized to a TOML table and the user's file is deep-merged on top,
//! so a config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [locales]
//! default = "en"               # Fallback locale for missing translations
//! supported = ["en", "de"]     # Locales the site is served in
//! strict = false               # Reject unknown locale tags instead of using the default
//!
//! [cache]
//! mode = "full-cache"          # full-cache | no-store | revalidate
//! default_ttl_secs = 3600      # TTL for full-cache entries
//! # revalidate_secs = 60       # TTL used by mode = "revalidate"
//! dir = ".groundwork-cache"    # Where the CLI persists cached responses
//!
//! [store]
//! project_id = ""              # CMS project id (required for fetching)
//! dataset = "production"
//! api_version = "2024-01-01"
//! use_cdn = true               # Ignored when a token is set
//! token_env = "SANITY_API_TOKEN"
//! timeout_secs = 10
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! Nothing here is read through a global: the resolved [`SiteConfig`] is
//! turned into [`LocaleSettings`] and [`CachePolicy`] values that are passed
//! to each component.

use crate::cache::CachePolicy;
use crate::locale::LocaleSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "groundwork.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `groundwork.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Supported locales and the fallback locale.
    pub locales: LocalesConfig,
    /// Response cache policy.
    pub cache: CacheConfig,
    /// CMS connection settings.
    pub store: StoreConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tags = std::iter::once(&self.locales.default).chain(&self.locales.supported);
        for tag in tags {
            if !is_locale_tag(tag) {
                return Err(ConfigError::Validation(format!(
                    "locales: '{tag}' is not a lowercase locale tag (e.g. \"en\", \"de-at\")"
                )));
            }
        }
        if !self.locales.supported.contains(&self.locales.default) {
            return Err(ConfigError::Validation(format!(
                "locales.default '{}' must be listed in locales.supported",
                self.locales.default
            )));
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.default_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.cache.mode == CacheMode::Revalidate && self.cache.revalidate_secs.is_none() {
            return Err(ConfigError::Validation(
                "cache.revalidate_secs is required when cache.mode = \"revalidate\"".into(),
            ));
        }
        if self.cache.revalidate_secs == Some(0) {
            return Err(ConfigError::Validation(
                "cache.revalidate_secs must be greater than 0".into(),
            ));
        }
        if self.store.dataset.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.dataset must not be empty".into(),
            ));
        }
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "store.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Locale settings for the resolver, normalizer and page loaders.
    pub fn locale_settings(&self) -> LocaleSettings {
        let supported: Vec<&str> = self.locales.supported.iter().map(String::as_str).collect();
        LocaleSettings::new(&self.locales.default, &supported).strict(self.locales.strict)
    }
}

/// `[a-z]{2,3}` optionally followed by `-` and alphanumeric subtags.
fn is_locale_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_lowercase()));
    primary_ok
        && parts.all(|p| {
            !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Supported locales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalesConfig {
    /// Locale used when a translation is missing.
    pub default: String,
    /// Every locale the site is served in. Must include `default`.
    pub supported: Vec<String>,
    /// Reject unknown locale tags instead of treating them as `default`.
    pub strict: bool,
}

impl Default for LocalesConfig {
    fn default() -> Self {
        Self {
            default: "en".to_string(),
            supported: vec!["en".to_string(), "de".to_string()],
            strict: false,
        }
    }
}

/// Which cache policy page loads use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    FullCache,
    NoStore,
    Revalidate,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Policy applied to page loads.
    pub mode: CacheMode,
    /// TTL of full-cache entries, in seconds.
    pub default_ttl_secs: u64,
    /// TTL used when `mode = "revalidate"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revalidate_secs: Option<u64>,
    /// Directory the CLI persists cached responses to.
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::FullCache,
            default_ttl_secs: 3600,
            revalidate_secs: None,
            dir: ".groundwork-cache".to_string(),
        }
    }
}

impl CacheConfig {
    /// The policy page loads should use.
    pub fn policy(&self) -> CachePolicy {
        match (self.mode, self.revalidate_secs) {
            (CacheMode::NoStore, _) => CachePolicy::NoStore,
            (CacheMode::Revalidate, Some(secs)) => CachePolicy::Revalidate(secs),
            (CacheMode::Revalidate, None) | (CacheMode::FullCache, _) => {
                CachePolicy::FullCache { ttl: None }
            }
        }
    }
}

/// CMS connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// CMS project id. Empty means "not configured".
    pub project_id: String,
    pub dataset: String,
    /// API version date, without the leading `v`.
    pub api_version: String,
    /// Read through the CDN host. Authenticated requests always use the API host.
    pub use_cdn: bool,
    /// Environment variable holding the read token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: "production".to_string(),
            api_version: "2024-01-01".to_string(),
            use_cdn: true,
            token_env: "SANITY_API_TOKEN".to_string(),
            timeout_secs: 10,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `groundwork.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `groundwork.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `groundwork.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Groundwork Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Locales
# ---------------------------------------------------------------------------
[locales]
# Locale used whenever a translation is missing.
default = "en"

# Every locale the site is served in. Must include the default.
supported = ["en", "de"]

# When false, unknown locale tags silently resolve to the default.
# When true, they are rejected.
strict = false

# ---------------------------------------------------------------------------
# Response cache
# ---------------------------------------------------------------------------
[cache]
# full-cache: serve cached responses until the TTL elapses or a tag is invalidated
# no-store:   always fetch fresh content
# revalidate: like full-cache, with revalidate_secs as the TTL
mode = "full-cache"

# TTL for full-cache entries, in seconds.
default_ttl_secs = 3600

# TTL for mode = "revalidate", in seconds.
# revalidate_secs = 60

# Directory where the CLI keeps cached responses between runs.
dir = ".groundwork-cache"

# ---------------------------------------------------------------------------
# Content store
# ---------------------------------------------------------------------------
[store]
# CMS project id. Fetching is disabled while this is empty.
project_id = ""
dataset = "production"
api_version = "2024-01-01"

# Read through the CDN. Requests with a token always use the live API.
use_cdn = true

# Environment variable holding the read token (optional).
token_env = "SANITY_API_TOKEN"

# Request timeout, in seconds.
timeout_secs = 10
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.locales.default, "en");
        assert_eq!(config.locales.supported, vec!["en", "de"]);
        assert!(!config.locales.strict);
        assert_eq!(config.cache.mode, CacheMode::FullCache);
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.store.dataset, "production");
        assert!(config.store.project_id.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[store]
project_id = "abc123"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.store.project_id, "abc123");
        // Defaults preserved
        assert_eq!(config.store.dataset, "production");
        assert_eq!(config.locales.default, "en");
    }

    #[test]
    fn locale_settings_from_config() {
        let toml = r#"
[locales]
default = "de"
supported = ["de", "en", "es"]
strict = true
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        let settings = config.locale_settings();
        assert_eq!(settings.default_locale().as_str(), "de");
        assert_eq!(settings.supported().len(), 3);
        assert!(settings.negotiate("fr").is_err());
    }

    // =========================================================================
    // Cache policy
    // =========================================================================

    #[test]
    fn cache_policy_from_mode() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.policy(), CachePolicy::FullCache { ttl: None });

        cache.mode = CacheMode::NoStore;
        assert_eq!(cache.policy(), CachePolicy::NoStore);

        cache.mode = CacheMode::Revalidate;
        cache.revalidate_secs = Some(60);
        assert_eq!(cache.policy(), CachePolicy::Revalidate(60));
    }

    #[test]
    fn parse_cache_mode_kebab_case() {
        let config: SiteConfig = toml::from_str("[cache]\nmode = \"no-store\"\n").unwrap();
        assert_eq!(config.cache.mode, CacheMode::NoStore);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[store]
dataset = "production"
use_cdn = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[store]
use_cdn = false
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["store"]["dataset"].as_str(), Some("production"));
        assert_eq!(merged["store"]["use_cdn"].as_bool(), Some(false));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("supported = [\"en\", \"de\"]").unwrap();
        let overlay: toml::Value = toml::from_str("supported = [\"en\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["supported"].as_array().map(Vec::len), Some(1));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_default_locale_must_be_supported() {
        let mut config = SiteConfig::default();
        config.locales.default = "fr".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_locale_tag_format() {
        let mut config = SiteConfig::default();
        config.locales.supported.push("DE".into());
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.locales.supported.push("de-at".into());
        assert!(config.validate().is_ok());

        let mut config = SiteConfig::default();
        config.locales.supported.push("en.us".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_ttl_nonzero() {
        let mut config = SiteConfig::default();
        config.cache.default_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_revalidate_requires_secs() {
        let mut config = SiteConfig::default();
        config.cache.mode = CacheMode::Revalidate;
        assert!(config.validate().is_err());
        config.cache.revalidate_secs = Some(0);
        assert!(config.validate().is_err());
        config.cache.revalidate_secs = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_store_fields() {
        let mut config = SiteConfig::default();
        config.store.dataset = " ".into();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.store.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[locales]
supported = ["en", "de", "es"]

[store]
project_id = "abc123"
dataset = "staging"
"#,
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.locales.supported, vec!["en", "de", "es"]);
        assert_eq!(config.store.project_id, "abc123");
        assert_eq!(config.store.dataset, "staging");
        assert_eq!(config.store.api_version, "2024-01-01");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[cache]\ndefault_ttl = 60\n",
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[locales]\ndefault = \"es\"\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for section in ["locales", "cache", "store"] {
            assert!(table.contains_key(section), "missing section {section}");
        }
    }
}
