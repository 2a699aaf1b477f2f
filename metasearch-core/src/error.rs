//! Error types for the metasearch-core crate.
//!
//! Only [`SearchError`] ever crosses the orchestrator boundary: it describes
//! a request that was rejected before anything was dispatched. Backend and
//! extension failures are captured as data in an
//! [`Outcome`](crate::outcome::Outcome) and never propagate as errors.

use std::any::Any;

/// Errors returned to the caller of an orchestrator entry point.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request itself is malformed (empty query, bad parameter value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested category has no registered backends.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// The delivery mode selector did not name a supported mode.
    #[error("invalid delivery mode '{0}': expected normal, stream or merged")]
    InvalidMode(String),

    /// Invalid aggregator or proxy configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Errors raised by a backend's `search` capability.
///
/// The orchestrator converts these into a failure outcome carrying the
/// display string.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider's response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider did not answer within the configured timeout.
    #[error("backend timed out: {0}")]
    Timeout(String),

    /// The backend does not support the requested parameters.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Errors raised by an extension's `run` capability.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The extension could not produce output for this query.
    #[error("extension failed: {0}")]
    Failed(String),
}

/// Errors raised while instantiating a catalog entry during discovery.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The constructor rejected its configured parameters or could not
    /// acquire a resource it needs.
    #[error("initialization failed: {0}")]
    Init(String),
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_request() {
        let err = SearchError::InvalidRequest("search query must not be empty".into());
        assert_eq!(
            err.to_string(),
            "invalid request: search query must not be empty"
        );
    }

    #[test]
    fn display_invalid_mode_names_the_choices() {
        let err = SearchError::InvalidMode("fast".into());
        assert_eq!(
            err.to_string(),
            "invalid delivery mode 'fast': expected normal, stream or merged"
        );
    }

    #[test]
    fn display_unknown_category() {
        let err = SearchError::UnknownCategory("music".into());
        assert_eq!(err.to_string(), "unknown category: music");
    }

    #[test]
    fn display_backend_errors() {
        assert_eq!(
            BackendError::Http("connection refused".into()).to_string(),
            "HTTP error: connection refused"
        );
        assert_eq!(
            BackendError::Timeout("exceeded 10s".into()).to_string(),
            "backend timed out: exceeded 10s"
        );
        assert_eq!(
            BackendError::Parse("no results container".into()).to_string(),
            "parse error: no results container"
        );
    }

    #[test]
    fn display_registry_error() {
        let err = RegistryError::Init("missing api key".into());
        assert_eq!(err.to_string(), "initialization failed: missing api key");
    }

    #[test]
    fn panic_message_handles_str_and_string() {
        let static_payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_payload.as_ref()), "boom");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned_payload.as_ref()), "owned boom");

        let other_payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(other_payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
        assert_send_sync::<BackendError>();
        assert_send_sync::<ExtensionError>();
        assert_send_sync::<RegistryError>();
    }
}
