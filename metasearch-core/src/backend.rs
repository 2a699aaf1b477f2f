//! Capability traits for pluggable search backends and extensions.
//!
//! A backend answers a query with a list of results. An extension runs
//! alongside backends (pre phase) or after all of them have finished (post
//! phase) and returns an opaque JSON value.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackendError, ExtensionError};
use crate::types::{BackendResponse, SearchParameters};

/// A pluggable search backend.
///
/// Implementors handle their own URL construction, HTTP, parsing,
/// pagination and locale mapping, and are expected to honour
/// [`SearchParameters::timeout`]. Returning an error (or even panicking) is
/// safe: the orchestrator turns either into a failure outcome for this
/// backend alone.
///
/// All implementations must be `Send + Sync` so one instance can serve
/// concurrent requests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one search.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the provider could not be queried or its
    /// response could not be parsed.
    async fn search(&self, params: &SearchParameters) -> Result<BackendResponse, BackendError>;
}

/// When an extension runs relative to backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Runs concurrently with backends.
    Pre,
    /// Runs after every backend and pre extension has resolved.
    Post,
    /// Declared a phase the orchestrator does not know how to schedule.
    Unknown,
}

impl Phase {
    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Phase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pre" => Self::Pre,
            "post" => Self::Post,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre- or post-processing add-on.
#[async_trait]
pub trait Extension: Send + Sync {
    /// The phase this extension wants to run in.
    fn phase(&self) -> Phase;

    /// Run against the user's query.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError`] if the extension cannot produce output.
    async fn run(&self, query: &str) -> Result<Value, ExtensionError>;
}
