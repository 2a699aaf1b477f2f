//! Process-wide search context.

use std::sync::Arc;

use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::orchestrator::pool::WorkerPool;
use crate::registry::CapabilityRegistry;

/// Everything a request needs besides its own parameters.
///
/// Built once at startup and passed by reference to the orchestrator entry
/// points. Cloning is cheap and shares the registry and pool.
#[derive(Debug, Clone)]
pub struct SearchContext {
    registry: Arc<CapabilityRegistry>,
    pool: WorkerPool,
    config: AggregatorConfig,
}

impl SearchContext {
    /// Create a context over a discovered registry.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`](crate::SearchError::Config) if
    /// `config` fails validation.
    pub fn new(registry: Arc<CapabilityRegistry>, config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_count());
        tracing::info!(workers = pool.size(), "search context ready");
        Ok(Self {
            registry,
            pool,
            config,
        })
    }

    /// The frozen capability registry.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// The shared worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Aggregator settings.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Catalog;

    #[test]
    fn pool_size_follows_config() {
        let registry = Arc::new(CapabilityRegistry::discover(Catalog::new()));
        let config = AggregatorConfig {
            max_workers: Some(3),
            ..Default::default()
        };
        let ctx = SearchContext::new(registry, config).expect("valid");
        assert_eq!(ctx.pool().size(), 3);
        assert_eq!(ctx.config().default_category, "general");
    }

    #[test]
    fn invalid_config_rejected() {
        let registry = Arc::new(CapabilityRegistry::discover(Catalog::new()));
        let config = AggregatorConfig {
            stream_buffer: 0,
            ..Default::default()
        };
        assert!(SearchContext::new(registry, config).is_err());
    }
}
