//! Session configuration
//!
//! Loaded from TOML, then overridden by `WIZARD_*` environment variables:
//! - `WIZARD_PRICING_TIMEOUT_MS`
//! - `WIZARD_FINANCIAL_ATTEMPTS`
//! - `WIZARD_SUBMIT_ATTEMPTS`
//! - `WIZARD_TEMPLATE_DIR`
//! - `WIZARD_TEMPLATE_CACHE_TTL_SECS`
//! - `WIZARD_AUTO_PRICE`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use wizard_pricing::{PricingConfig, RetryPolicy};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override does not parse
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Raw value
        value: String,
    },
}

/// Wizard session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pricing orchestrator settings
    pub pricing: PricingConfig,
    /// Retry policy of profile submission
    pub submission_retry: RetryPolicy,
    /// Directory of industry template documents
    pub template_dir: Option<PathBuf>,
    /// Maximum cached templates
    pub template_cache_capacity: u64,
    /// Template cache time-to-live
    pub template_cache_ttl_secs: u64,
    /// Start pricing when the profile completes or add-ons are confirmed
    pub auto_price: bool,
    /// Write a snapshot slice after every state change
    pub persist_snapshots: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            submission_retry: RetryPolicy::default(),
            template_dir: None,
            template_cache_capacity: 64,
            template_cache_ttl_secs: 3_600,
            auto_price: true,
            persist_snapshots: true,
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With pricing config
    #[inline]
    #[must_use]
    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// With submission retry policy
    #[inline]
    #[must_use]
    pub fn with_submission_retry(mut self, policy: RetryPolicy) -> Self {
        self.submission_retry = policy;
        self
    }

    /// With template directory
    #[inline]
    #[must_use]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// With automatic pricing
    #[inline]
    #[must_use]
    pub fn with_auto_price(mut self, enabled: bool) -> Self {
        self.auto_price = enabled;
        self
    }

    /// Template cache time-to-live
    #[inline]
    #[must_use]
    pub fn template_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.template_cache_ttl_secs)
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file, then apply environment overrides
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or an
    /// override is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)?.with_env_overrides()
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for an unparsable value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for an unparsable value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(ms) = parse_var(&lookup, "WIZARD_PRICING_TIMEOUT_MS")? {
            self.pricing.total_timeout_ms = ms;
        }
        if let Some(n) = parse_var(&lookup, "WIZARD_FINANCIAL_ATTEMPTS")? {
            self.pricing.financial_retry.attempts = n;
        }
        if let Some(n) = parse_var(&lookup, "WIZARD_SUBMIT_ATTEMPTS")? {
            self.submission_retry.attempts = n;
        }
        if let Some(dir) = lookup("WIZARD_TEMPLATE_DIR").filter(|d| !d.trim().is_empty()) {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = parse_var(&lookup, "WIZARD_TEMPLATE_CACHE_TTL_SECS")? {
            self.template_cache_ttl_secs = secs;
        }
        if let Some(enabled) = parse_var(&lookup, "WIZARD_AUTO_PRICE")? {
            self.auto_price = enabled;
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
    }
}
