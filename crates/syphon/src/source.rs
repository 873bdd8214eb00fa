//! Data-source capability
//!
//! A data source describes one kind of remote request: how to derive its
//! identity and how to perform the actual I/O. The evaluator only ever sees
//! erased [`SourceRequest`] handles; grouping, deduplication, caching, and
//! batching all happen outside the source implementation.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::SourceError;
use crate::types::{Env, Identity, ResourceKind, Value};

/// Future returned by a single fetch.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Value, SourceError>> + Send>>;

/// Future returned by a batched fetch: one response per input identity.
pub type BatchFuture =
    Pin<Box<dyn Future<Output = Result<IndexMap<Identity, Value>, SourceError>> + Send>>;

/// A user-defined remote request.
///
/// Implementors provide a stable [`identity`](DataSource::identity) (the
/// dedup/cache key within this kind) and a [`fetch`](DataSource::fetch) that
/// performs the I/O. The remaining methods are optional capabilities with
/// working defaults, so a source that only fetches one request at a time
/// compiles and works immediately.
pub trait DataSource: Any + Send + Sync {
    /// Stable identity for this request. Two requests with equal identities
    /// are semantically the same request and will be fetched at most once
    /// per run.
    fn identity(&self) -> Identity;

    /// Perform the fetch. Failures propagate through the returned future and
    /// abort the run.
    fn fetch(&self, env: &Env) -> FetchFuture;

    /// Batching probe. Return `Some` to fetch this request together with
    /// `others` (all of the same kind, already deduplicated) in one call.
    ///
    /// The resolved map must contain a response for every input identity,
    /// including this request's own; a missing key fails the run with
    /// [`Error::BatchIncomplete`](crate::Error::BatchIncomplete).
    fn fetch_multi(&self, others: &[SourceRequest], env: &Env) -> Option<BatchFuture> {
        let _ = (others, env);
        None
    }

    /// Display name for this source's kind, used in logs and errors.
    fn kind_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The kind token grouping requests of this source type. Not meant to be
    /// overridden.
    fn kind(&self) -> ResourceKind {
        ResourceKind::new(TypeId::of::<Self>(), self.kind_name())
    }
}

/// An erased, shareable handle to a [`DataSource`] request.
#[derive(Clone)]
pub struct SourceRequest(Arc<dyn DataSource>);

impl SourceRequest {
    pub fn new<S: DataSource>(source: S) -> Self {
        Self(Arc::new(source))
    }

    pub fn kind(&self) -> ResourceKind {
        self.0.kind()
    }

    pub fn identity(&self) -> Identity {
        self.0.identity()
    }

    /// Borrow the concrete source back out of the handle. Useful inside
    /// `fetch_multi`, which receives its peers as erased requests.
    pub fn downcast_ref<S: DataSource>(&self) -> Option<&S> {
        (&*self.0 as &dyn Any).downcast_ref::<S>()
    }

    pub(crate) fn fetch(&self, env: &Env) -> FetchFuture {
        self.0.fetch(env)
    }

    pub(crate) fn fetch_multi(&self, others: &[SourceRequest], env: &Env) -> Option<BatchFuture> {
        self.0.fetch_multi(others, env)
    }
}

impl fmt::Debug for SourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRequest")
            .field("kind", &self.kind().name())
            .field("identity", &self.identity())
            .finish()
    }
}
