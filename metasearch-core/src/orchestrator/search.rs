//! Request resolution and the three delivery modes.
//!
//! Every mode dispatches the same units on the context's [`WorkerPool`]:
//!
//! - **Batch** waits for all backends and pre extensions, then returns their
//!   outcomes keyed by name.
//! - **Stream** emits each outcome as soon as its task resolves, runs post
//!   extensions once everything else has finished, and closes with the
//!   result count and [`StreamEvent::Done`].
//! - **Merged** is batch followed by [`reconcile`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::Phase;
use crate::context::SearchContext;
use crate::error::{Result, SearchError};
use crate::outcome::{ExtensionOutcome, Outcomes};
use crate::registry::{BackendHandle, ExtensionHandle};
use crate::types::{BackendResponse, SearchParameters};

use super::events::{EventStream, StreamEvent};
use super::pool::{settle, UnitKind, WorkerPool};
use super::reconcile::{reconcile, ReconciledResults};

/// How results are delivered to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Wait for everything, return outcomes keyed by name.
    #[default]
    Batch,
    /// Emit events as units complete.
    Stream,
    /// Batch, then deduplicate across backends.
    Merged,
}

impl DeliveryMode {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "normal",
            Self::Stream => "stream",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "batch" => Ok(Self::Batch),
            "stream" | "streaming" => Ok(Self::Stream),
            "merged" | "merge" => Ok(Self::Merged),
            _ => Err(SearchError::InvalidMode(s.to_owned())),
        }
    }
}

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Parameters handed unchanged to every backend.
    pub params: SearchParameters,
    /// Requested category. `None` uses the configured default.
    pub category: Option<String>,
    /// Backends to query. Empty selects every backend in the category.
    pub backends: Vec<String>,
    /// Extensions to run. `None` selects every active extension.
    pub extensions: Option<Vec<String>>,
    /// Delivery mode, used by [`run`].
    pub mode: DeliveryMode,
}

impl SearchRequest {
    /// A batch request over the default category with all extensions.
    pub fn new(params: SearchParameters) -> Self {
        Self {
            params,
            category: None,
            backends: Vec::new(),
            extensions: None,
            mode: DeliveryMode::default(),
        }
    }

    /// Restrict to a category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Name the backends to query.
    pub fn with_backends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends = names.into_iter().map(Into::into).collect();
        self
    }

    /// Name the extensions to run.
    pub fn with_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Choose the delivery mode.
    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Output of batch mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    /// One outcome per dispatched backend, in selection order.
    #[serde(rename = "results")]
    pub backend_outcomes: Outcomes<BackendResponse>,
    /// One outcome per dispatched pre extension.
    #[serde(rename = "pre_plugins")]
    pub pre_extension_outcomes: Outcomes<serde_json::Value>,
    /// Sum of successful result-list lengths after truncation.
    #[serde(rename = "number_of_results")]
    pub total_result_count: usize,
}

/// Output of merged mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedResponse {
    /// Deduplicated results.
    pub results: ReconciledResults,
    /// One outcome per dispatched pre extension.
    #[serde(rename = "pre_plugins")]
    pub pre_extension_outcomes: Outcomes<serde_json::Value>,
    /// Number of reconciled items.
    #[serde(rename = "number_of_results")]
    pub result_count: usize,
}

/// Output of [`run`], one variant per delivery mode.
pub enum SearchResponse {
    /// See [`run_batch`].
    Batch(BatchResponse),
    /// See [`run_stream`].
    Stream(EventStream),
    /// See [`run_merged`].
    Merged(MergedResponse),
}

impl fmt::Debug for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(r) => f.debug_tuple("Batch").field(r).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish_non_exhaustive(),
            Self::Merged(r) => f.debug_tuple("Merged").field(r).finish(),
        }
    }
}

/// Units selected for one request, already resolved against the registry.
#[derive(Debug, Default)]
struct Selection {
    backends: Vec<BackendHandle>,
    pre: Vec<ExtensionHandle>,
    post: Vec<ExtensionHandle>,
}

/// Validate `request` and resolve its selection.
///
/// Unknown backend or extension names are skipped with a warning, as are
/// extensions with an unknown phase. A name selected twice is dispatched
/// once.
fn resolve(ctx: &SearchContext, request: &SearchRequest) -> Result<Selection> {
    request.params.validate()?;
    let registry = ctx.registry();

    let category = match request.category.as_deref().map(|c| c.trim().to_ascii_lowercase()) {
        Some(c) if !c.is_empty() => {
            if !registry.has_category(&c) {
                return Err(SearchError::UnknownCategory(c));
            }
            c
        }
        _ => ctx.config().default_category.clone(),
    };

    let backend_names = if request.backends.is_empty() {
        registry.list_by_category(&category)
    } else {
        request.backends.clone()
    };

    let mut selection = Selection::default();
    for name in dedup(backend_names) {
        match registry.resolve_backend(&name) {
            Some(handle) => selection.backends.push(handle),
            None => {
                tracing::warn!(backend = %name, "backend not found or failed to load, skipping")
            }
        }
    }

    match &request.extensions {
        None => {
            selection.pre = registry.extensions_in_phase(Phase::Pre);
            selection.post = registry.extensions_in_phase(Phase::Post);
        }
        Some(names) => {
            for name in dedup(names.clone()) {
                let Some(handle) = registry.resolve_extension(&name) else {
                    tracing::warn!(
                        extension = %name,
                        "extension not found or failed to load, skipping"
                    );
                    continue;
                };
                match handle.phase() {
                    Phase::Pre => selection.pre.push(handle),
                    Phase::Post => selection.post.push(handle),
                    Phase::Unknown => {
                        tracing::warn!(
                            extension = %name,
                            "extension has an unknown phase, skipping"
                        );
                    }
                }
            }
        }
    }

    tracing::trace!(query = %request.params.query, "resolved search request");
    tracing::debug!(
        %category,
        backends = selection.backends.len(),
        pre = selection.pre.len(),
        post = selection.post.len(),
        "dispatching search"
    );
    Ok(selection)
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Run `request` in the mode it names.
///
/// # Errors
///
/// Returns [`SearchError`] if the request fails validation. Unit failures
/// never surface here; they are recorded as outcomes.
pub async fn run(ctx: &SearchContext, request: SearchRequest) -> Result<SearchResponse> {
    match request.mode {
        DeliveryMode::Batch => run_batch(ctx, request).await.map(SearchResponse::Batch),
        DeliveryMode::Stream => run_stream(ctx, request).await.map(SearchResponse::Stream),
        DeliveryMode::Merged => run_merged(ctx, request).await.map(SearchResponse::Merged),
    }
}

/// Dispatch every selected backend and pre extension and wait for all of
/// them.
///
/// # Errors
///
/// Returns [`SearchError`] if the request fails validation.
pub async fn run_batch(ctx: &SearchContext, request: SearchRequest) -> Result<BatchResponse> {
    let selection = resolve(ctx, &request)?;
    Ok(execute_batch(ctx.pool(), selection, Arc::new(request.params)).await)
}

async fn execute_batch(
    pool: &WorkerPool,
    selection: Selection,
    params: Arc<SearchParameters>,
) -> BatchResponse {
    let query: Arc<str> = Arc::from(params.query.as_str());

    let backend_tasks: Vec<_> = selection
        .backends
        .into_iter()
        .map(|h| (h.name().to_owned(), pool.spawn_backend(h, Arc::clone(&params))))
        .collect();
    let pre_tasks: Vec<_> = selection
        .pre
        .into_iter()
        .map(|h| {
            let name = h.name().to_owned();
            (name, pool.spawn_extension(UnitKind::PreExtension, h, Arc::clone(&query)))
        })
        .collect();

    let mut backend_outcomes = Outcomes::new();
    for (name, task) in backend_tasks {
        let outcome = settle(UnitKind::Backend, &name, task.await);
        backend_outcomes.insert(name, outcome);
    }
    let mut pre_extension_outcomes = Outcomes::new();
    for (name, task) in pre_tasks {
        let outcome = settle(UnitKind::PreExtension, &name, task.await);
        pre_extension_outcomes.insert(name, outcome);
    }

    let total_result_count = backend_outcomes.result_count();
    tracing::debug!(
        backends = backend_outcomes.len(),
        total = total_result_count,
        "batch complete"
    );
    BatchResponse {
        backend_outcomes,
        pre_extension_outcomes,
        total_result_count,
    }
}

/// Dispatch like [`run_batch`] but deliver outcomes as they complete.
///
/// The returned stream ends with [`StreamEvent::ResultCount`] followed by
/// [`StreamEvent::Done`]. Dropping it early leaves running tasks to finish
/// on their own; their events are discarded.
///
/// # Errors
///
/// Returns [`SearchError`] if the request fails validation.
pub async fn run_stream(ctx: &SearchContext, request: SearchRequest) -> Result<EventStream> {
    let selection = resolve(ctx, &request)?;
    let (tx, rx) = mpsc::channel(ctx.config().stream_buffer);
    tokio::spawn(drive_stream(
        ctx.pool().clone(),
        selection,
        Arc::new(request.params),
        tx,
    ));
    Ok(Box::pin(ReceiverStream::new(rx)))
}

fn extension_event(
    pool: &WorkerPool,
    kind: UnitKind,
    handle: ExtensionHandle,
    query: &Arc<str>,
) -> BoxFuture<'static, StreamEvent> {
    let name = handle.name().to_owned();
    let task = pool.spawn_extension(kind, handle, Arc::clone(query));
    async move {
        let outcome: ExtensionOutcome = settle(kind, &name, task.await);
        match kind {
            UnitKind::PostExtension => StreamEvent::PostPluginResult { name, outcome },
            _ => StreamEvent::PrePluginResult { name, outcome },
        }
    }
    .boxed()
}

async fn drive_stream(
    pool: WorkerPool,
    selection: Selection,
    params: Arc<SearchParameters>,
    tx: mpsc::Sender<StreamEvent>,
) {
    let query: Arc<str> = Arc::from(params.query.as_str());
    let mut pending: FuturesUnordered<BoxFuture<'static, StreamEvent>> = FuturesUnordered::new();

    for handle in selection.backends {
        let name = handle.name().to_owned();
        let task = pool.spawn_backend(handle, Arc::clone(&params));
        pending.push(
            async move {
                let outcome = settle(UnitKind::Backend, &name, task.await);
                StreamEvent::EngineResult { name, outcome }
            }
            .boxed(),
        );
    }
    for handle in selection.pre {
        pending.push(extension_event(&pool, UnitKind::PreExtension, handle, &query));
    }

    let mut count = 0;
    while let Some(event) = pending.next().await {
        if let StreamEvent::EngineResult { outcome, .. } = &event {
            count += outcome.result_count();
        }
        if tx.send(event).await.is_err() {
            tracing::debug!("stream consumer went away");
            return;
        }
    }

    let mut post: FuturesUnordered<_> = selection
        .post
        .into_iter()
        .map(|h| extension_event(&pool, UnitKind::PostExtension, h, &query))
        .collect();
    while let Some(event) = post.next().await {
        if tx.send(event).await.is_err() {
            tracing::debug!("stream consumer went away");
            return;
        }
    }

    tracing::debug!(total = count, "stream complete");
    for event in [StreamEvent::ResultCount(count), StreamEvent::Done] {
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

/// Batch dispatch followed by cross-backend reconciliation.
///
/// # Errors
///
/// Returns [`SearchError`] if the request fails validation.
pub async fn run_merged(ctx: &SearchContext, request: SearchRequest) -> Result<MergedResponse> {
    let batch = run_batch(ctx, request).await?;
    let results = reconcile(&batch.backend_outcomes);
    tracing::debug!(
        before = batch.total_result_count,
        after = results.len(),
        "merged results"
    );
    Ok(MergedResponse {
        result_count: results.len(),
        results,
        pre_extension_outcomes: batch.pre_extension_outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Extension};
    use crate::config::AggregatorConfig;
    use crate::error::{BackendError, ExtensionError};
    use crate::registry::{BackendParams, CapabilityRegistry, Catalog};
    use crate::types::ResultItem;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Fixed(Vec<ResultItem>);

    #[async_trait]
    impl Backend for Fixed {
        async fn search(
            &self,
            _params: &SearchParameters,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::new(self.0.clone()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Backend for Failing {
        async fn search(
            &self,
            _params: &SearchParameters,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Err(BackendError::Http("connection refused".into()))
        }
    }

    struct Echo(Phase);

    #[async_trait]
    impl Extension for Echo {
        fn phase(&self) -> Phase {
            self.0
        }

        async fn run(&self, query: &str) -> std::result::Result<Value, ExtensionError> {
            Ok(json!({ "query": query }))
        }
    }

    fn items(n: usize, prefix: &str) -> Vec<ResultItem> {
        (0..n)
            .map(|i| {
                ResultItem::new(
                    format!("{prefix} {i}"),
                    format!("https://{prefix}.com/{i}"),
                    "",
                )
            })
            .collect()
    }

    fn context() -> SearchContext {
        let mut catalog = Catalog::new();
        catalog
            .register_backend("five", None, BackendParams::new(), |_| {
                Ok(Arc::new(Fixed(items(5, "five"))))
            })
            .register_backend("two", None, BackendParams::new(), |_| {
                Ok(Arc::new(Fixed(items(2, "two"))))
            })
            .register_backend("down", None, BackendParams::new(), |_| Ok(Arc::new(Failing)))
            .register_backend("pics", Some("images".into()), BackendParams::new(), |_| {
                Ok(Arc::new(Fixed(items(1, "pics"))))
            })
            .register_extension("spell", || Ok(Arc::new(Echo(Phase::Pre))))
            .register_extension("summary", || Ok(Arc::new(Echo(Phase::Post))))
            .register_extension("odd", || Ok(Arc::new(Echo(Phase::Unknown))));
        let registry = Arc::new(CapabilityRegistry::discover(catalog));
        SearchContext::new(registry, AggregatorConfig::default()).expect("valid config")
    }

    #[test]
    fn delivery_mode_parsing() {
        assert_eq!("normal".parse::<DeliveryMode>().ok(), Some(DeliveryMode::Batch));
        assert_eq!(" Stream ".parse::<DeliveryMode>().ok(), Some(DeliveryMode::Stream));
        assert_eq!("merged".parse::<DeliveryMode>().ok(), Some(DeliveryMode::Merged));
        let err = "fast".parse::<DeliveryMode>().unwrap_err();
        assert!(matches!(err, SearchError::InvalidMode(ref m) if m == "fast"));
        assert!(err.to_string().contains("expected normal, stream or merged"));
        assert_eq!(DeliveryMode::Batch.to_string(), "normal");
    }

    #[tokio::test]
    async fn batch_defaults_to_category_backends() {
        let ctx = context();
        let response = run_batch(&ctx, SearchRequest::new(SearchParameters::new("rust")))
            .await
            .expect("batch");
        let names: Vec<&str> = response.backend_outcomes.names().collect();
        assert_eq!(names, vec!["five", "two", "down"]);
        assert_eq!(response.total_result_count, 7);
        assert_eq!(
            response.backend_outcomes.get("down").and_then(|o| o.error()),
            Some("HTTP error: connection refused")
        );
        assert_eq!(
            response.pre_extension_outcomes.get("spell"),
            Some(&crate::outcome::Outcome::Success(json!({"query": "rust"})))
        );
    }

    #[tokio::test]
    async fn unknown_and_duplicate_names_are_handled() {
        let ctx = context();
        let request = SearchRequest::new(SearchParameters::new("rust"))
            .with_backends(["two", "missing", "two"])
            .with_extensions(["odd", "nope", "summary"]);
        let response = run_batch(&ctx, request).await.expect("batch");
        assert_eq!(response.backend_outcomes.len(), 1);
        assert!(response.pre_extension_outcomes.is_empty());
    }

    #[tokio::test]
    async fn result_limit_truncates_each_backend() {
        let ctx = context();
        let params = SearchParameters {
            result_limit: Some(2),
            ..SearchParameters::new("rust")
        };
        let response = run_batch(&ctx, SearchRequest::new(params)).await.expect("batch");
        assert_eq!(response.backend_outcomes.get("five").map(|o| o.result_count()), Some(2));
        assert_eq!(response.backend_outcomes.get("two").map(|o| o.result_count()), Some(2));
        assert_eq!(response.total_result_count, 4);
    }

    #[tokio::test]
    async fn category_is_case_insensitive_and_validated() {
        let ctx = context();
        let response = run_batch(
            &ctx,
            SearchRequest::new(SearchParameters::new("cats")).with_category("IMAGES"),
        )
        .await
        .expect("batch");
        assert_eq!(response.backend_outcomes.names().collect::<Vec<_>>(), vec!["pics"]);

        let err = run_batch(
            &ctx,
            SearchRequest::new(SearchParameters::new("cats")).with_category("music"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SearchError::UnknownCategory(ref c) if c == "music"));
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let ctx = context();
        let err = run(&ctx, SearchRequest::new(SearchParameters::new("  ")))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn stream_ends_with_count_then_done() {
        let ctx = context();
        let request =
            SearchRequest::new(SearchParameters::new("rust")).with_mode(DeliveryMode::Stream);
        let SearchResponse::Stream(stream) = run(&ctx, request).await.expect("stream") else {
            panic!("expected a stream");
        };
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 3 + 1 + 1 + 2);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
        assert_eq!(events[events.len() - 2], StreamEvent::ResultCount(7));
        assert_eq!(events[events.len() - 3].kind(), "post_plugin_result");
        assert_eq!(events[events.len() - 3].name(), Some("summary"));
        assert_eq!(
            events.iter().filter(|e| e.kind() == "engine_result").count(),
            3
        );
    }

    #[tokio::test]
    async fn merged_reports_reconciled_count() {
        let ctx = context();
        let request = SearchRequest::new(SearchParameters::new("rust"))
            .with_backends(["five", "two"])
            .with_mode(DeliveryMode::Merged);
        let SearchResponse::Merged(merged) = run(&ctx, request).await.expect("merged") else {
            panic!("expected merged output");
        };
        assert_eq!(merged.result_count, 7);
        assert_eq!(merged.results.len(), 7);
    }
}
