//! Built-in backend catalog and context assembly.

use std::sync::Arc;

use metasearch_core::engines::BraveBackend;
use metasearch_core::{
    BackendParams, CapabilityRegistry, Catalog, DiscoveryReport, RegistryError, SearchContext,
};

use crate::config::{BRAVE_KIND, MetasearchConfig};
use crate::error::Result;

/// Catalog of every backend named in `active_backends`.
///
/// Each entry is configured from its `[backends.<name>]` table. An entry of
/// an unknown kind is still registered so that discovery reports it as
/// failed.
pub fn builtin_catalog(config: &MetasearchConfig) -> Catalog {
    let mut catalog = Catalog::new();
    for name in &config.active_backends {
        let settings = config.backend_settings(name);
        if settings.kind == BRAVE_KIND {
            catalog.register_backend(
                name.as_str(),
                settings.category,
                settings.params,
                BraveBackend::constructor,
            );
        } else {
            let kind = settings.kind;
            catalog.register_backend(
                name.as_str(),
                settings.category,
                settings.params,
                move |_: &BackendParams| {
                    Err(RegistryError::Init(format!("unknown backend kind '{kind}'")))
                },
            );
        }
    }
    catalog
}

/// Validate `config`, discover the built-in catalog and build a context.
///
/// # Errors
///
/// Returns an error if the configuration is invalid. Backends that fail to
/// initialise are reported, not returned as errors.
pub fn build_context(config: &MetasearchConfig) -> Result<(SearchContext, DiscoveryReport)> {
    config.validate()?;
    let registry = CapabilityRegistry::discover(builtin_catalog(config));
    let report = registry.report();
    let context = SearchContext::new(Arc::new(registry), config.aggregator_config())?;
    tracing::info!(
        active = report.backends.active.len(),
        failed = report.backends.failed.len(),
        extensions = report.extensions.active.len(),
        workers = context.pool().size(),
        "search context ready"
    );
    if !report.backends.failed.is_empty() {
        tracing::warn!(failed = ?report.backends.failed, "some backends failed to initialise");
    }
    Ok((context, report))
}
