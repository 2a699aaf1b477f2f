//! metasearch: one query, many search backends.
//!
//! The host side of the aggregator. It loads [`MetasearchConfig`] from TOML,
//! turns the configured backends into a
//! [`Catalog`](metasearch_core::Catalog), and builds the
//! [`SearchContext`](metasearch_core::SearchContext) that the
//! `metasearch` binary runs requests against.
//!
//! The search machinery itself lives in [`metasearch_core`].

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{build_context, builtin_catalog};
pub use config::{BackendSettings, MetasearchConfig, ProxySettings};
pub use error::{MetasearchError, Result};
