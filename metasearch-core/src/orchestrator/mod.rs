//! Search orchestrator: bounded concurrent dispatch, delivery modes and
//! cross-backend reconciliation.
//!
//! Backends and pre extensions fan out on a shared worker pool. Every task
//! resolves to an [`Outcome`](crate::outcome::Outcome) under its own name,
//! so one failing unit never affects the others.

pub mod events;
pub mod pool;
pub mod reconcile;
pub mod search;

pub use events::{EventStream, StreamEvent};
pub use pool::WorkerPool;
pub use reconcile::{reconcile, reconcile_items, ReconciledResults};
pub use search::{
    run, run_batch, run_merged, run_stream, BatchResponse, DeliveryMode, MergedResponse,
    SearchRequest, SearchResponse,
};
