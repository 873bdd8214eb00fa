//! Syphon
//!
//! Declarative remote-data access. Application code describes *what* data
//! it needs as a composable [`Plan`]; the evaluator decides *how* to fetch
//! it: independent requests run concurrently, same-kind requests batch into
//! one call, identical requests deduplicate, and responses are cached for
//! the life of one run.
//!
//! # Architecture
//!
//! - [`plan`] - The plan tree and the combinators that build it:
//!   [`value`], [`Plan::map`], [`Plan::flat_map`], [`collect`], [`traverse`]
//! - [`source`] - The [`DataSource`] capability implemented by each request
//!   kind, with optional batching
//! - [`cache`] - The write-once, per-run response [`Cache`]
//! - [`executor`] - The level-by-level evaluator and the run surface:
//!   [`execute`], [`run`], [`run_blocking`]
//! - [`types`] - [`Value`], [`Identity`], [`ResourceKind`], [`Env`]
//! - [`error`] - Error types for failed runs
//!
//! # Execution model
//!
//! Evaluation proceeds in levels. Each level rewrites the tree against the
//! cache, collects every pending request reachable from the root, groups
//! them by resource kind, deduplicates by identity, and fetches all groups
//! concurrently. Once every response has landed in the cache the next level
//! begins; a plan with no data dependencies between its requests therefore
//! costs one round trip.
//!
//! # Example
//!
//! ```ignore
//! use syphon::{collect, run_blocking, Opts, Plan};
//!
//! let plan = collect(vec![
//!     Plan::source(UserById { id: 1 }),
//!     Plan::source(UserById { id: 2 }),
//! ])
//! .map(|users| Ok(users));
//!
//! let users = run_blocking(plan, Opts::new())?;
//! ```

pub mod cache;
pub mod error;
pub mod executor;
mod fetch;
pub mod plan;
pub mod source;
pub mod types;

pub use cache::Cache;
pub use error::{Error, Result, SourceError};
pub use executor::{Opts, execute, run, run_blocking};
pub use plan::{BindFn, MapFn, Plan, collect, traverse, value};
pub use source::{BatchFuture, DataSource, FetchFuture, SourceRequest};
pub use types::{Env, Identity, ResourceKind, Value};
