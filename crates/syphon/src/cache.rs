//! Per-run response cache
//!
//! Two-level mapping from resource kind to request identity to response.
//! Entries are write-once for the lifetime of one run; the evaluator reads
//! it while rewriting the plan and merges new responses between levels.

use indexmap::IndexMap;
use tracing::trace;

use crate::source::DataSource;
use crate::types::{Identity, ResourceKind, Value};

/// Response cache for a single run.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: IndexMap<ResourceKind, IndexMap<Identity, Value>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached response.
    pub fn lookup(&self, kind: ResourceKind, identity: &Identity) -> Option<&Value> {
        self.entries.get(&kind).and_then(|kind_entries| kind_entries.get(identity))
    }

    /// Insert a response. Entries are write-once: the first write wins and
    /// later writes for the same key are ignored. Returns whether the entry
    /// was written.
    pub fn insert(&mut self, kind: ResourceKind, identity: Identity, response: Value) -> bool {
        let kind_entries = self.entries.entry(kind).or_default();
        if kind_entries.contains_key(&identity) {
            trace!(kind = %kind, identity = %identity, "duplicate cache write ignored");
            return false;
        }
        kind_entries.insert(identity, response);
        true
    }

    /// Merge one kind's fetched responses.
    pub fn merge(&mut self, kind: ResourceKind, responses: IndexMap<Identity, Value>) {
        for (identity, response) in responses {
            self.insert(kind, identity, response);
        }
    }

    /// Seed an entry from a concrete source, for caller-supplied initial
    /// caches.
    pub fn prime<S: DataSource>(&mut self, source: &S, response: impl Into<Value>) {
        self.insert(source.kind(), source.identity(), response.into());
    }

    /// Total number of cached responses across all kinds.
    pub fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(IndexMap::is_empty)
    }

    /// Kinds with at least one cached response.
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.entries.keys().copied()
    }
}
