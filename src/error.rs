//! Error types for the metasearch host.

/// Top-level error type for configuration and startup.
#[derive(Debug, thiserror::Error)]
pub enum MetasearchError {
    /// Configuration could not be parsed, serialized or validated.
    #[error("config error: {0}")]
    Config(String),

    /// The search core rejected a request or its settings.
    #[error(transparent)]
    Search(#[from] metasearch_core::SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MetasearchError>;
