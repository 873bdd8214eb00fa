//! Evaluation errors

use thiserror::Error;

use crate::types::{Identity, ResourceKind};

/// Evaluation result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error type produced by a data source's fetch implementation.
///
/// Sources report failures in whatever error type suits them; the evaluator
/// wraps them in [`Error::FetchFailed`] together with the request that failed.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Evaluation errors
#[derive(Debug, Error)]
pub enum Error {
    /// A fetch issued for a request failed. Short-circuits the run; no
    /// partial results are delivered.
    #[error("fetch failed for {kind} request {identity}: {source}")]
    FetchFailed {
        kind: ResourceKind,
        identity: Identity,
        source: SourceError,
    },

    /// A batched fetch returned a response map that does not cover every
    /// input identity.
    #[error("batched fetch for {kind} missing responses: {missing:?}")]
    BatchIncomplete {
        kind: ResourceKind,
        missing: Vec<Identity>,
    },

    /// The evaluator kept rewriting the plan without discovering any
    /// pending fetches or reaching a final value.
    #[error("plan made no progress after {rounds} evaluation rounds")]
    Diverged { rounds: usize },

    /// A list-shaped combinator received a value that is not a list.
    #[error("expected a list value, got {found}")]
    ExpectedList { found: &'static str },

    /// A plan function reported a failure of its own.
    #[error("plan function failed: {message}")]
    Apply { message: String },

    /// The blocking runner could not start its runtime.
    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::Apply`] from any displayable message.
    pub fn apply(message: impl Into<String>) -> Self {
        Error::Apply {
            message: message.into(),
        }
    }
}
