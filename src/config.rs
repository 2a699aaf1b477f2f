//! Host configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file (or no file at all) yields
//! a working setup that queries Brave web and news.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use metasearch_core::{
    AggregatorConfig, BackendParams, DeliveryMode, ProxyConfig, SafeSearch, SearchParameters,
    SearchRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MetasearchError, Result};

/// Backend kind handled by [`metasearch_core::engines::BraveBackend`].
pub const BRAVE_KIND: &str = "brave";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetasearchConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub logging_level: String,
    /// Derive the worker pool size from the CPU count.
    pub auto_max_workers: bool,
    /// Worker pool size when `auto_max_workers` is off.
    pub max_workers: usize,
    /// Backends to register, by name. Each may have a `[backends.<name>]`
    /// table.
    pub active_backends: Vec<String>,
    /// Extensions a request runs by default. Empty means all active ones.
    pub active_extensions: Vec<String>,
    /// Result language, e.g. `en-US`.
    pub language: String,
    /// Result region, e.g. `US`.
    pub country: String,
    /// Per-backend result limit. 0 means unlimited.
    pub limit: usize,
    /// Result page, starting at 1.
    pub page: u32,
    /// Safe search level 0 to 2.
    pub safesearch: u8,
    /// Category used when a request names none.
    pub default_category: String,
    /// `normal`, `stream` or `merged`.
    pub delivery_mode: String,
    /// Per-backend request timeout in seconds.
    pub timeout_secs: u64,
    /// Outbound proxy.
    pub proxy: ProxySettings,
    /// Per-backend settings keyed by backend name.
    pub backends: BTreeMap<String, BackendSettings>,
}

impl Default for MetasearchConfig {
    fn default() -> Self {
        let mut backends = BTreeMap::new();
        backends.insert("brave".to_owned(), BackendSettings::default());
        let mut news_params = BackendParams::new();
        news_params.insert("category".into(), Value::String("news".into()));
        backends.insert(
            "brave_news".to_owned(),
            BackendSettings {
                kind: BRAVE_KIND.into(),
                category: Some("news".into()),
                params: news_params,
            },
        );

        Self {
            logging_level: "info".into(),
            auto_max_workers: true,
            max_workers: 8,
            active_backends: vec!["brave".into(), "brave_news".into()],
            active_extensions: Vec::new(),
            language: "en-US".into(),
            country: "US".into(),
            limit: 0,
            page: 1,
            safesearch: 0,
            default_category: "general".into(),
            delivery_mode: DeliveryMode::Batch.to_string(),
            timeout_secs: 10,
            proxy: ProxySettings::default(),
            backends,
        }
    }
}

/// `[proxy]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Whether backends should use the proxy.
    pub enabled: bool,
    /// Proxy for plain HTTP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// Proxy for HTTPS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

/// `[backends.<name>]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Which implementation to instantiate.
    pub kind: String,
    /// Category the backend is listed under. Unset means `general`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Opaque parameters handed to the backend's constructor.
    pub params: BackendParams,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BRAVE_KIND.into(),
            category: None,
            params: BackendParams::new(),
        }
    }
}

impl MetasearchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| MetasearchError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MetasearchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/metasearch/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("metasearch").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("metasearch")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/metasearch-config/config.toml")
        }
    }

    /// Check every field that can be wrong without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`MetasearchError::Config`] or [`MetasearchError::Search`]
    /// naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.logging_level.trim().is_empty() {
            return Err(MetasearchError::Config("logging_level must not be empty".into()));
        }
        if !self.auto_max_workers && self.max_workers == 0 {
            return Err(MetasearchError::Config(
                "max_workers must be greater than 0 when auto_max_workers is off".into(),
            ));
        }
        if self.page == 0 {
            return Err(MetasearchError::Config("page must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(MetasearchError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        SafeSearch::try_from(self.safesearch)?;
        self.delivery_mode()?;
        self.proxy_config()?;
        self.aggregator_config().validate()?;
        Ok(())
    }

    /// The `delivery_mode` field, parsed.
    ///
    /// # Errors
    ///
    /// Returns [`MetasearchError::Search`] for an unknown mode name.
    pub fn delivery_mode(&self) -> Result<DeliveryMode> {
        Ok(self.delivery_mode.parse()?)
    }

    /// Validated proxy settings, or `None` when the proxy is disabled or
    /// has no URLs.
    ///
    /// # Errors
    ///
    /// Returns [`MetasearchError::Search`] if an enabled proxy URL is
    /// malformed or not `http`/`https`.
    pub fn proxy_config(&self) -> Result<Option<ProxyConfig>> {
        if !self.proxy.enabled {
            return Ok(None);
        }
        Ok(ProxyConfig::from_urls(
            self.proxy.http.clone(),
            self.proxy.https.clone(),
        )?)
    }

    /// Settings for the search core.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            max_workers: (!self.auto_max_workers).then_some(self.max_workers),
            default_category: self.default_category.trim().to_ascii_lowercase(),
            ..AggregatorConfig::default()
        }
    }

    /// Search parameters for `query` built from the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the safe search level or proxy is invalid.
    pub fn default_parameters(&self, query: impl Into<String>) -> Result<SearchParameters> {
        Ok(SearchParameters {
            query: query.into(),
            page: self.page,
            safesearch: SafeSearch::try_from(self.safesearch)?,
            time_range: None,
            result_limit: (self.limit > 0).then_some(self.limit),
            locale: self.language.clone(),
            country: self.country.clone(),
            proxy: self.proxy_config()?,
            timeout_secs: self.timeout_secs,
        })
    }

    /// A request for `query` using the configured delivery mode and
    /// extensions.
    ///
    /// # Errors
    ///
    /// Same as [`default_parameters`](Self::default_parameters), plus an
    /// invalid delivery mode.
    pub fn default_request(&self, query: impl Into<String>) -> Result<SearchRequest> {
        let mut request =
            SearchRequest::new(self.default_parameters(query)?).with_mode(self.delivery_mode()?);
        if !self.active_extensions.is_empty() {
            request = request.with_extensions(self.active_extensions.iter().cloned());
        }
        Ok(request)
    }

    /// Settings for backend `name`, falling back to a plain Brave backend.
    pub fn backend_settings(&self, name: &str) -> BackendSettings {
        self.backends.get(name).cloned().unwrap_or_default()
    }
}
