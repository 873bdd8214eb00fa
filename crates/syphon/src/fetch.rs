//! Fetch grouping and dispatch
//!
//! Takes the frontier of pending requests discovered by one evaluation
//! level, groups them by resource kind, deduplicates by identity, and
//! dispatches each group: one plain fetch for a lone request, one batched
//! fetch for kinds that opt in, concurrent per-item fetches otherwise.

use std::collections::HashSet;

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::source::SourceRequest;
use crate::types::{Env, Identity, ResourceKind, Value};

/// Group a frontier by kind, deduplicating by identity within each kind.
/// The first occurrence of an identity wins; order is preserved.
pub(crate) fn group_by_kind(
    frontier: Vec<SourceRequest>,
) -> IndexMap<ResourceKind, Vec<SourceRequest>> {
    let mut seen: HashSet<(ResourceKind, Identity)> = HashSet::new();
    let mut groups: IndexMap<ResourceKind, Vec<SourceRequest>> = IndexMap::new();

    for request in frontier {
        let kind = request.kind();
        let identity = request.identity();
        if seen.insert((kind, identity.clone())) {
            groups.entry(kind).or_default().push(request);
        } else {
            trace!(kind = %kind, identity = %identity, "request deduplicated");
        }
    }

    groups
}

/// Dispatch one non-empty, deduplicated same-kind group and resolve to its
/// kind plus a response per identity.
pub(crate) async fn dispatch(
    kind: ResourceKind,
    requests: Vec<SourceRequest>,
    env: &Env,
) -> Result<(ResourceKind, IndexMap<Identity, Value>)> {
    debug!(kind = %kind, requests = requests.len(), "dispatching group");

    if let [request] = requests.as_slice() {
        let identity = request.identity();
        let response = request.fetch(env).await.map_err(|source| Error::FetchFailed {
            kind,
            identity: identity.clone(),
            source,
        })?;
        let mut responses = IndexMap::new();
        responses.insert(identity, response);
        return Ok((kind, responses));
    }

    if let Some(batch) = requests[0].fetch_multi(&requests[1..], env) {
        trace!(kind = %kind, "batched dispatch");
        let responses = batch.await.map_err(|source| Error::FetchFailed {
            kind,
            identity: requests[0].identity(),
            source,
        })?;

        // The batch contract: a response for every input identity.
        let missing: Vec<Identity> = requests
            .iter()
            .map(SourceRequest::identity)
            .filter(|identity| !responses.contains_key(identity))
            .collect();
        if !missing.is_empty() {
            return Err(Error::BatchIncomplete { kind, missing });
        }
        return Ok((kind, responses));
    }

    trace!(kind = %kind, "per-item dispatch");
    let fetches = requests.iter().map(|request| {
        let identity = request.identity();
        let fut = request.fetch(env);
        async move {
            match fut.await {
                Ok(response) => Ok((identity, response)),
                Err(source) => Err(Error::FetchFailed {
                    kind,
                    identity,
                    source,
                }),
            }
        }
    });
    let responses = try_join_all(fetches).await?;
    Ok((kind, responses.into_iter().collect()))
}
