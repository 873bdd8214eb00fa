//! Core evaluation types
//!
//! Requests and responses traffic in dynamic JSON values; identities and
//! resource kinds together form the deduplication and cache key.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::cache::Cache;

/// The dynamic value currency of the library.
///
/// Responses, identities, and the inputs and outputs of plan functions are
/// all [`serde_json::Value`]s, which carry the structural equality and
/// hashing the cache requires.
pub type Value = serde_json::Value;

/// Deduplication and cache key for a request, within one resource kind.
///
/// Two requests with equal identity but different source types are not
/// unified; the kind participates in the full cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(Value);

impl Identity {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(Value::String(s.to_string()))
    }
}

/// The nominal type of a source request.
///
/// Kinds partition the cache and group requests for batching. The token is
/// the source type's [`TypeId`], so two kinds can never collide; the name
/// only serves display and error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    id: TypeId,
    name: &'static str,
}

impl ResourceKind {
    pub(crate) fn new(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Read-only context handed to every fetch.
///
/// Carries a snapshot of the cache as of the current evaluation level plus
/// any caller-supplied variables. Cheap to clone; fetch implementations must
/// treat it as immutable.
#[derive(Debug, Clone)]
pub struct Env {
    cache: Arc<Cache>,
    vars: Arc<IndexMap<String, Value>>,
}

impl Env {
    pub(crate) fn new(cache: Cache, vars: Arc<IndexMap<String, Value>>) -> Self {
        Self {
            cache: Arc::new(cache),
            vars,
        }
    }

    /// The cache as of the start of the current level.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Look up a caller-supplied variable.
    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// All caller-supplied variables.
    pub fn vars(&self) -> &IndexMap<String, Value> {
        &self.vars
    }
}

/// Short description of a value's shape, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
