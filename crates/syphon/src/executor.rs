//! Plan evaluator
//!
//! Walks a plan level by level: rewrite the tree against the cache, collect
//! the frontier of pending requests, fetch the whole frontier concurrently,
//! merge the responses into the cache, repeat until the root is done. All
//! requests discovered in one pass are in flight before any continuation
//! runs, which maximizes batching; levels themselves are strictly
//! sequential.

use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::fetch::{dispatch, group_by_kind};
use crate::plan::Plan;
use crate::source::SourceRequest;
use crate::types::{Env, Value};

/// Continuations re-injected within a single rewrite pass before the
/// evaluator gives up on a plan that regenerates itself forever.
const MAX_CONTINUATION_DEPTH: usize = 512;

/// Frontier-less rewrite rounds tolerated before declaring divergence.
const MAX_QUIET_ROUNDS: usize = 64;

/// Options for one run.
#[derive(Debug, Default)]
pub struct Opts {
    /// Initial cache; responses already present are served without fetching.
    pub cache: Cache,
    /// Caller context passed through to every fetch via [`Env`].
    pub vars: IndexMap<String, Value>,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// Evaluate a plan to its final value plus the cache accumulated along the
/// way.
#[instrument(skip_all)]
pub async fn execute(plan: Plan, opts: Opts) -> Result<(Value, Cache)> {
    let Opts { mut cache, vars } = opts;
    let vars = Arc::new(vars);
    let mut ast = plan;
    let mut level: u64 = 0;
    let mut quiet_rounds = 0usize;

    loop {
        ast = inject(ast, &cache, 0)?;

        let mut frontier = Vec::new();
        collect_frontier(&ast, &mut frontier);

        if frontier.is_empty() {
            match ast {
                Plan::Done(value) => {
                    debug!(levels = level, cached = cache.len(), "plan resolved");
                    return Ok((value, cache));
                }
                pending => {
                    // Progress can still happen by pure reduction, but not
                    // forever.
                    quiet_rounds += 1;
                    if quiet_rounds > MAX_QUIET_ROUNDS {
                        return Err(Error::Diverged {
                            rounds: quiet_rounds,
                        });
                    }
                    ast = pending;
                    continue;
                }
            }
        }
        quiet_rounds = 0;
        level += 1;

        let groups = group_by_kind(frontier);
        debug!(level, kinds = groups.len(), "fetching level");

        let env = Env::new(cache.clone(), vars.clone());
        let results = try_join_all(
            groups
                .into_iter()
                .map(|(kind, requests)| dispatch(kind, requests, &env)),
        )
        .await?;

        for (kind, responses) in results {
            cache.merge(kind, responses);
        }
    }
}

/// Evaluate a plan to its final value, discarding the cache.
pub async fn run(plan: Plan, opts: Opts) -> Result<Value> {
    let (value, _cache) = execute(plan, opts).await?;
    Ok(value)
}

/// Evaluate a plan on a private current-thread runtime, blocking until it
/// resolves.
///
/// Intended for synchronous callers, including data sources that evaluate a
/// nested plan from inside their own `fetch`. Must not be called from
/// within an async context.
pub fn run_blocking(plan: Plan, opts: Opts) -> Result<Value> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(plan, opts))
}

/// One top-down rewrite pass: resolve sources against the cache, reduce
/// nodes whose children are all done, and chase flat-map continuations.
fn inject(plan: Plan, cache: &Cache, depth: usize) -> Result<Plan> {
    Ok(match plan {
        Plan::Done(value) => Plan::Done(value),
        Plan::Source(request) => resolve_source(request, cache),
        Plan::Wrap(inner) => inject(*inner, cache, depth)?,
        Plan::Map { f, children } => {
            let children = inject_children(children, cache, depth)?;
            if children.iter().all(Plan::is_done) {
                Plan::Done(f(fold_args(done_values(children)))?)
            } else {
                Plan::Map { f, children }
            }
        }
        Plan::FlatMap { f, children } => {
            let children = inject_children(children, cache, depth)?;
            if children.iter().all(Plan::is_done) {
                if depth >= MAX_CONTINUATION_DEPTH {
                    return Err(Error::Diverged { rounds: depth });
                }
                let next = f(fold_args(done_values(children)))?;
                inject(next, cache, depth + 1)?
            } else {
                Plan::FlatMap { f, children }
            }
        }
    })
}

fn inject_children(children: Vec<Plan>, cache: &Cache, depth: usize) -> Result<Vec<Plan>> {
    children
        .into_iter()
        .map(|child| inject(child, cache, depth))
        .collect()
}

/// Cache hit resolves the request in place; a miss lifts it into a
/// one-child pending node so the next pass after fetching reduces it.
fn resolve_source(request: SourceRequest, cache: &Cache) -> Plan {
    match cache.lookup(request.kind(), &request.identity()) {
        Some(response) => Plan::Done(response.clone()),
        None => Plan::Map {
            f: Arc::new(|response| Ok(response)),
            children: vec![Plan::Source(request)],
        },
    }
}

/// All `Source` leaves reachable through non-`Done` nodes.
fn collect_frontier(plan: &Plan, frontier: &mut Vec<SourceRequest>) {
    match plan {
        Plan::Done(_) => {}
        Plan::Source(request) => frontier.push(request.clone()),
        Plan::Wrap(inner) => collect_frontier(inner, frontier),
        Plan::Map { children, .. } | Plan::FlatMap { children, .. } => {
            for child in children {
                collect_frontier(child, frontier);
            }
        }
    }
}

fn done_values(children: Vec<Plan>) -> Vec<Value> {
    children
        .into_iter()
        .map(|child| match child {
            Plan::Done(value) => value,
            _ => unreachable!("caller checked all children are done"),
        })
        .collect()
}

/// Node calling convention: a single child's value is passed bare, multiple
/// children arrive as a list in child order.
fn fold_args(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}
