//! Bounded worker pool for backend and extension tasks.
//!
//! Every unit runs as its own tokio task, but at most `size` of them hold a
//! permit at once. Each task converts whatever its unit produces (value,
//! error or panic) into an [`Outcome`], so a spawned task always resolves.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use crate::error::panic_message;
use crate::outcome::{BackendOutcome, ExtensionOutcome, Outcome};
use crate::registry::{BackendHandle, ExtensionHandle};
use crate::types::SearchParameters;

/// Kind of unit, for log fields and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitKind {
    Backend,
    PreExtension,
    PostExtension,
}

impl UnitKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::PreExtension => "pre extension",
            Self::PostExtension => "post extension",
        }
    }
}

/// Shared, clonable handle on the pool's permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool allowing `size` concurrent tasks (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrently running tasks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Dispatch one backend search. The result list is truncated to the
    /// request's limit before the task resolves.
    pub(crate) fn spawn_backend(
        &self,
        handle: BackendHandle,
        params: Arc<SearchParameters>,
    ) -> JoinHandle<BackendOutcome> {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Outcome::failure("worker pool is closed");
            };
            let outcome = guarded(
                UnitKind::Backend,
                handle.name(),
                handle.backend().search(&params),
            )
            .await;
            if let Outcome::Success(response) = &outcome {
                tracing::debug!(
                    backend = handle.name(),
                    count = response.results.len(),
                    "backend returned results"
                );
            }
            outcome.map(|response| response.truncated(params.result_limit))
        })
    }

    /// Dispatch one extension run.
    pub(crate) fn spawn_extension(
        &self,
        kind: UnitKind,
        handle: ExtensionHandle,
        query: Arc<str>,
    ) -> JoinHandle<ExtensionOutcome> {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Outcome::failure("worker pool is closed");
            };
            guarded(kind, handle.name(), handle.extension().run(&query)).await
        })
    }
}

/// Run `fut`, catching both its error and any panic.
async fn guarded<T, E, F>(kind: UnitKind, name: &str, fut: F) -> Outcome<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(err)) => {
            tracing::warn!(kind = kind.as_str(), name, error = %err, "task failed");
            Outcome::failure(err.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(kind = kind.as_str(), name, panic = %message, "task panicked");
            Outcome::failure(format!("{} '{name}' panicked: {message}", kind.as_str()))
        }
    }
}

/// Flatten a joined task into its outcome. A task that never reported back
/// (aborted or lost at runtime shutdown) still yields a failure.
pub(crate) fn settle<T>(
    kind: UnitKind,
    name: &str,
    joined: Result<Outcome<T>, JoinError>,
) -> Outcome<T> {
    joined.unwrap_or_else(|err| {
        tracing::error!(kind = kind.as_str(), name, error = %err, "task did not complete");
        Outcome::failure(format!("{} '{name}' did not complete: {err}", kind.as_str()))
    })
}
