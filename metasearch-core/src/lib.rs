//! # metasearch-core
//!
//! Fan-out meta-search: one query, many pluggable backends, one answer.
//!
//! ## Design
//!
//! - Backends and extensions are registered in a [`Catalog`] and instantiated
//!   once by [`CapabilityRegistry::discover`]; failures are quarantined, not
//!   fatal
//! - Requests run concurrently on a bounded worker pool held by a
//!   [`SearchContext`]
//! - Three delivery modes: batch, streaming and merged
//!   (see [`DeliveryMode`])
//! - Every unit resolves to an [`Outcome`]: one failing or panicking backend
//!   never affects another
//! - Merged mode deduplicates results by exact URL and attributes each item
//!   to every backend that returned it
//!
//! ## Security
//!
//! - No network listeners, this is a library
//! - Search queries are logged only at trace level
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> metasearch_core::Result<()> {
//! use std::sync::Arc;
//! use metasearch_core::engines::BraveBackend;
//! use metasearch_core::{
//!     AggregatorConfig, BackendParams, CapabilityRegistry, Catalog, SearchContext,
//!     SearchParameters, SearchRequest,
//! };
//!
//! let mut catalog = Catalog::new();
//! catalog.register_backend("brave", None, BackendParams::new(), BraveBackend::constructor);
//! let registry = Arc::new(CapabilityRegistry::discover(catalog));
//! let ctx = SearchContext::new(registry, AggregatorConfig::default())?;
//!
//! let request = SearchRequest::new(SearchParameters::new("rust programming"));
//! let response = metasearch_core::run_merged(&ctx, request).await?;
//! for item in response.results.iter() {
//!     println!("{}: {}", item.title, item.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod engines;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod outcome;
pub mod registry;
pub mod types;

pub use backend::{Backend, Extension, Phase};
pub use config::AggregatorConfig;
pub use context::SearchContext;
pub use error::{BackendError, ExtensionError, RegistryError, Result, SearchError};
pub use orchestrator::{
    reconcile, reconcile_items, run, run_batch, run_merged, run_stream, BatchResponse,
    DeliveryMode, EventStream, MergedResponse, ReconciledResults, SearchRequest, SearchResponse,
    StreamEvent,
};
pub use outcome::{BackendOutcome, ExtensionOutcome, Outcome, Outcomes};
pub use registry::{
    BackendDescriptor, BackendParams, CapabilityRegistry, Catalog, DiscoveryReport,
    ExtensionDescriptor, Status,
};
pub use types::{
    BackendResponse, EngineAttribution, ProxyConfig, ResultItem, SafeSearch, SearchParameters,
    TimeRange,
};
