//! Core value types: result items, per-request search parameters and the
//! response a backend hands back to the orchestrator.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SearchError;

/// Which backend(s) contributed a [`ResultItem`].
///
/// A freshly flattened item carries a single name. After reconciliation an
/// item that several backends agreed on carries every contributing name in
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineAttribution {
    /// Exactly one contributing backend.
    Single(String),
    /// Two or more contributing backends, in first-seen order.
    Many(Vec<String>),
}

impl EngineAttribution {
    /// Build an attribution from an ordered, duplicate-free list of names.
    ///
    /// Returns `None` for an empty list and collapses a single name to
    /// [`EngineAttribution::Single`].
    pub fn from_names(mut names: Vec<String>) -> Option<Self> {
        match names.len() {
            0 => None,
            1 => names.pop().map(Self::Single),
            _ => Some(Self::Many(names)),
        }
    }

    /// All contributing backend names.
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// A single search result produced by a backend.
///
/// `url` is the identity key used for deduplication. Provider-specific
/// fields (publication date, author, ...) ride along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Title of the result page.
    #[serde(default)]
    pub title: String,
    /// URL of the result page.
    #[serde(default)]
    pub url: String,
    /// Snippet text.
    #[serde(default)]
    pub content: String,
    /// Optional thumbnail image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Contributing backend name(s). Stamped by the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineAttribution>,
    /// Any other provider fields, carried through opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultItem {
    /// Create an item with the three mandatory text fields.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Whether the item has both a title and a URL.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.url.is_empty()
    }
}

/// What a backend returns on success: its ordered results plus free-form
/// metadata (page, category, provider hints).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Results in the backend's own order.
    #[serde(default)]
    pub results: Vec<ResultItem>,
    /// Provider metadata. Opaque to the core.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl BackendResponse {
    /// Create a response with no metadata.
    pub fn new(results: Vec<ResultItem>) -> Self {
        Self {
            results,
            metadata: Map::new(),
        }
    }

    /// Keep at most `limit` results. `None` and `Some(0)` mean unlimited.
    pub fn truncated(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit.filter(|l| *l > 0) {
            self.results.truncate(limit);
        }
        self
    }
}

/// Safe search strictness requested from backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SafeSearch {
    /// No filtering (level 0).
    #[default]
    Off,
    /// Moderate filtering (level 1).
    Moderate,
    /// Strict filtering (level 2).
    Strict,
}

impl TryFrom<u8> for SafeSearch {
    type Error = SearchError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::Off),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Strict),
            other => Err(SearchError::InvalidRequest(format!(
                "safesearch level must be 0, 1 or 2 (got {other})"
            ))),
        }
    }
}

impl From<SafeSearch> for u8 {
    fn from(level: SafeSearch) -> Self {
        match level {
            SafeSearch::Off => 0,
            SafeSearch::Moderate => 1,
            SafeSearch::Strict => 2,
        }
    }
}

/// Restrict results to a recent time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// Past 24 hours.
    Day,
    /// Past week.
    Week,
    /// Past month.
    Month,
    /// Past year.
    Year,
}

impl TimeRange {
    /// Lowercase identifier used in config files and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Parse an optional time range where an empty string or `"none"` means
    /// no filter.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, SearchError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl FromStr for TimeRange {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(SearchError::InvalidRequest(format!(
                "time range must be day, week, month or year (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound proxy settings handed to every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy for plain HTTP requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// Proxy for HTTPS requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Build a validated proxy config.
    ///
    /// Empty strings count as unset. Returns `Ok(None)` when neither proxy
    /// is set, so callers never carry an inert config around.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if a proxy URL does not parse or its
    /// scheme is not `http` or `https`.
    pub fn from_urls(
        http: Option<String>,
        https: Option<String>,
    ) -> Result<Option<Self>, SearchError> {
        let proxy = Self {
            http: http.filter(|v| !v.is_empty()),
            https: https.filter(|v| !v.is_empty()),
        };
        if proxy.http.is_none() && proxy.https.is_none() {
            return Ok(None);
        }
        proxy.validate()?;
        Ok(Some(proxy))
    }

    /// Check every configured proxy URL.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), SearchError> {
        for (key, value) in [("http", &self.http), ("https", &self.https)] {
            let Some(value) = value else { continue };
            let parsed = url::Url::parse(value)
                .map_err(|e| SearchError::Config(format!("{key} proxy is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SearchError::Config(format!(
                    "{key} proxy must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }
}

/// Everything a backend needs to answer one query.
///
/// Built once per incoming request and shared, unchanged, by every
/// concurrently dispatched backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    /// The user's query text.
    pub query: String,
    /// 1-based result page.
    pub page: u32,
    /// Safe search level.
    pub safesearch: SafeSearch,
    /// Optional recency filter.
    pub time_range: Option<TimeRange>,
    /// Per-backend result cap. `None` or `Some(0)` means unlimited.
    pub result_limit: Option<usize>,
    /// UI / result language, e.g. `en-US`.
    pub locale: String,
    /// Region, e.g. `US`.
    pub country: String,
    /// Outbound proxy, if any.
    pub proxy: Option<ProxyConfig>,
    /// How long a backend may spend on this request, in seconds. Enforced by
    /// the backend itself.
    pub timeout_secs: u64,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            query: String::new(),
            page: 1,
            safesearch: SafeSearch::Off,
            time_range: None,
            result_limit: None,
            locale: "en-US".into(),
            country: "US".into(),
            proxy: None,
            timeout_secs: 10,
        }
    }
}

impl SearchParameters {
    /// Parameters for `query` with every other field at its default.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// The backend timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject parameters no backend could sensibly serve.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidRequest`] for an empty query, page 0 or
    /// a zero timeout, and [`SearchError::Config`] for a bad proxy.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidRequest(
                "search query must not be empty".into(),
            ));
        }
        if self.page == 0 {
            return Err(SearchError::InvalidRequest(
                "page numbers start at 1".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(SearchError::InvalidRequest(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        Ok(())
    }
}
