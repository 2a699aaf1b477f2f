//! Aggregator configuration with sensible defaults.
//!
//! [`AggregatorConfig`] controls the worker pool size, the category used
//! when a request names none, and the buffering of streamed events.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Upper bound on the automatically derived worker pool size.
pub const MAX_AUTO_WORKERS: usize = 32;

/// Category backends fall into when they declare none.
pub const DEFAULT_CATEGORY: &str = "general";

/// Configuration for the orchestrator.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Maximum number of backend/extension tasks in flight at once.
    /// `None` derives `min(32, 2 × available parallelism)`.
    pub max_workers: Option<usize>,
    /// Category used when a request does not name one.
    pub default_category: String,
    /// Capacity of the event queue between the stream driver and its
    /// consumer.
    pub stream_buffer: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            default_category: DEFAULT_CATEGORY.into(),
            stream_buffer: 64,
        }
    }
}

impl AggregatorConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_workers`, when set, must be greater than 0
    /// - `default_category` must not be empty
    /// - `stream_buffer` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_workers == Some(0) {
            return Err(SearchError::Config(
                "max_workers must be greater than 0".into(),
            ));
        }
        if self.default_category.trim().is_empty() {
            return Err(SearchError::Config(
                "default_category must not be empty".into(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(SearchError::Config(
                "stream_buffer must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolved worker pool size.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(auto_worker_count)
    }
}

/// `min(32, 2 × available parallelism)`, assuming 4 cores when the
/// platform cannot say.
pub fn auto_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4);
    cores.saturating_mul(2).min(MAX_AUTO_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = AggregatorConfig::default();
        assert!(config.max_workers.is_none());
        assert_eq!(config.default_category, "general");
        assert_eq!(config.stream_buffer, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn auto_worker_count_is_bounded() {
        let workers = auto_worker_count();
        assert!(workers >= 2);
        assert!(workers <= MAX_AUTO_WORKERS);
        assert_eq!(workers % 2, 0);
    }

    #[test]
    fn explicit_worker_count_wins() {
        let config = AggregatorConfig {
            max_workers: Some(3),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn zero_workers_rejected() {
        let config = AggregatorConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn empty_default_category_rejected() {
        let config = AggregatorConfig {
            default_category: "  ".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_category"));
    }

    #[test]
    fn zero_stream_buffer_rejected() {
        let config = AggregatorConfig {
            stream_buffer: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stream_buffer"));
    }
}
