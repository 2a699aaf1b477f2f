//! Result reconciliation by exact URL.
//!
//! Flattens the successful backend outcomes of one request into a single
//! list, drops incomplete items and merges items that several backends
//! returned for the same URL. URLs are compared byte for byte; no
//! normalisation is applied.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::outcome::Outcomes;
use crate::types::{BackendResponse, EngineAttribution, ResultItem};

/// Dense, order-stable merged result list.
///
/// Serializes as an object keyed `"0"`, `"1"`, ... in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledResults(Vec<ResultItem>);

impl ReconciledResults {
    /// Number of merged items.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing survived reconciliation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Items in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultItem> {
        self.0.iter()
    }

    /// Item at dense index `index`.
    pub fn get(&self, index: usize) -> Option<&ResultItem> {
        self.0.get(index)
    }

    /// Unwrap into the underlying list.
    pub fn into_vec(self) -> Vec<ResultItem> {
        self.0
    }
}

impl Serialize for ReconciledResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, item) in self.0.iter().enumerate() {
            map.serialize_entry(&index.to_string(), item)?;
        }
        map.end()
    }
}

/// Merge every successful backend outcome into one deduplicated list.
///
/// Items are taken in outcome order, then in each backend's own order, and
/// stamped with the backend's name before merging. Failed outcomes
/// contribute nothing.
pub fn reconcile(outcomes: &Outcomes<BackendResponse>) -> ReconciledResults {
    let flattened = outcomes
        .iter()
        .filter_map(|(name, outcome)| outcome.success().map(|r| (name, r)))
        .flat_map(|(name, response)| {
            response.results.iter().map(move |item| ResultItem {
                engine: Some(EngineAttribution::Single(name.to_owned())),
                ..item.clone()
            })
        })
        .collect();
    reconcile_items(flattened)
}

/// Deduplicate already-attributed items.
///
/// Items missing a title or URL are dropped. For each URL the item with
/// the longest title (in characters, first seen on ties) is kept, and its
/// `engine` becomes the union of every member's engines in first-seen
/// order. Buckets keep the position of their first member.
///
/// Running this on its own output returns the same list.
pub fn reconcile_items(items: Vec<ResultItem>) -> ReconciledResults {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for item in items.into_iter().filter(ResultItem::is_complete) {
        match positions.get(&item.url) {
            Some(&index) => buckets[index].absorb(item),
            None => {
                positions.insert(item.url.clone(), buckets.len());
                buckets.push(Bucket::new(item));
            }
        }
    }

    ReconciledResults(buckets.into_iter().map(Bucket::finish).collect())
}

struct Bucket {
    best: ResultItem,
    best_len: usize,
    engines: Vec<String>,
    members: usize,
}

impl Bucket {
    fn new(item: ResultItem) -> Self {
        let mut bucket = Self {
            best_len: item.title.chars().count(),
            engines: Vec::new(),
            members: 1,
            best: item,
        };
        let names = bucket.best.engine.as_ref().map(|e| e.names().to_vec());
        bucket.add_engines(names.unwrap_or_default());
        bucket
    }

    fn absorb(&mut self, item: ResultItem) {
        self.members += 1;
        if let Some(engine) = &item.engine {
            self.add_engines(engine.names().to_vec());
        }
        let len = item.title.chars().count();
        if len > self.best_len {
            self.best_len = len;
            self.best = item;
        }
    }

    fn add_engines(&mut self, names: Vec<String>) {
        for name in names {
            if !self.engines.contains(&name) {
                self.engines.push(name);
            }
        }
    }

    fn finish(mut self) -> ResultItem {
        if self.members > 1 {
            self.best.engine = EngineAttribution::from_names(self.engines);
        }
        self.best
    }
}
