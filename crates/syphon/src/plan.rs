//! Composable fetch plans
//!
//! A plan is a finite tree describing *what* data a computation needs; the
//! evaluator in [`executor`](crate::executor) decides *how* to fetch it.
//! Constructors fuse nested transformations so chained `map`s stay a single
//! node, which keeps the tree flat and the closures small.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::source::{DataSource, SourceRequest};
use crate::types::{Value, value_kind};

/// Transformation applied by a [`Plan::Map`] node once its children resolve.
pub type MapFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Continuation of a [`Plan::FlatMap`] node: yields a further plan to be
/// evaluated.
pub type BindFn = Arc<dyn Fn(Value) -> Result<Plan> + Send + Sync>;

/// A declarative description of data to fetch and how to shape it.
///
/// Plans are cheap to clone (node functions are shared) and inert until
/// handed to [`execute`](crate::execute), [`run`](crate::run), or
/// [`run_blocking`](crate::run_blocking).
///
/// When a node's function runs, it receives the single child value directly
/// if the node has exactly one child, and a list of child values in child
/// order otherwise. This calling convention is part of the public contract.
#[derive(Clone)]
pub enum Plan {
    /// Fully evaluated leaf.
    Done(Value),
    /// Wraps an already-constructed subplan; equivalent to mapping the
    /// identity function over it.
    Wrap(Box<Plan>),
    /// Apply `f` once all children are done.
    Map { f: MapFn, children: Vec<Plan> },
    /// Like `Map`, but `f` yields another plan to evaluate further.
    FlatMap { f: BindFn, children: Vec<Plan> },
    /// A request awaiting dispatch.
    Source(SourceRequest),
}

/// Lift a plain value into a plan. Requires no fetches to evaluate.
pub fn value(v: impl Into<Value>) -> Plan {
    Plan::Done(v.into())
}

/// Evaluate every plan in the list and collect the results in input order.
///
/// `collect(vec![])` is `value([])`. A single-element list whose element is
/// a composed node fuses into the element itself, per the compose rules.
pub fn collect(plans: Vec<Plan>) -> Plan {
    if plans.is_empty() {
        Plan::Done(Value::Array(Vec::new()))
    } else {
        Plan::map_all(plans, Ok)
    }
}

/// Evaluate `plan` to a list, apply `f` to every element, and collect the
/// resulting plans in order.
///
/// Evaluating the result of a non-list `plan` fails with
/// [`Error::ExpectedList`].
pub fn traverse<F>(plan: Plan, f: F) -> Plan
where
    F: Fn(Value) -> Plan + Send + Sync + 'static,
{
    plan.flat_map(move |items| match items {
        Value::Array(items) => Ok(collect(items.into_iter().map(&f).collect())),
        other => Err(Error::ExpectedList {
            found: value_kind(&other),
        }),
    })
}

impl Plan {
    /// Lift a data-source request into a plan.
    pub fn source<S: DataSource>(source: S) -> Plan {
        Plan::Source(SourceRequest::new(source))
    }

    /// Wrap an already-constructed plan without transforming it.
    pub fn wrap(plan: Plan) -> Plan {
        Plan::Wrap(Box::new(plan))
    }

    /// Apply `f` to this plan's value.
    ///
    /// Mapping over an already-done plan applies `f` eagerly; mapping over a
    /// `Map` or `FlatMap` composes into the existing node instead of
    /// nesting.
    pub fn map<F>(self, f: F) -> Plan
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.map_fn(Arc::new(f))
    }

    /// Apply `f` over the values of `children`, per the node calling
    /// convention.
    ///
    /// A single-element list whose element is itself a composed node fuses
    /// by composition rather than nesting a new node.
    pub fn map_all<F>(children: Vec<Plan>, f: F) -> Plan
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Plan::map_all_fn(children, Arc::new(f))
    }

    /// Apply `f` to this plan's value, then evaluate the plan it returns.
    pub fn flat_map<F>(self, f: F) -> Plan
    where
        F: Fn(Value) -> Result<Plan> + Send + Sync + 'static,
    {
        self.flat_map_fn(Arc::new(f))
    }

    /// List form of [`flat_map`](Plan::flat_map), with the same fusion rule
    /// as [`map_all`](Plan::map_all). Always produces a `FlatMap` node.
    pub fn flat_map_all<F>(children: Vec<Plan>, f: F) -> Plan
    where
        F: Fn(Value) -> Result<Plan> + Send + Sync + 'static,
    {
        Plan::flat_map_all_fn(children, Arc::new(f))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Plan::Done(_))
    }

    fn map_fn(self, f: MapFn) -> Plan {
        match self {
            // Eager when possible; a failing function is deferred so the
            // error surfaces from the run instead of the constructor.
            Plan::Done(v) => match f(v.clone()) {
                Ok(mapped) => Plan::Done(mapped),
                Err(_) => Plan::Map {
                    f,
                    children: vec![Plan::Done(v)],
                },
            },
            Plan::Wrap(inner) => Plan::Map {
                f,
                children: vec![*inner],
            },
            Plan::Map { f: g, children } => Plan::Map {
                f: compose(f, g),
                children,
            },
            // Stays a FlatMap: the new function rides along inside the
            // continuation instead of degrading the node to a Map.
            Plan::FlatMap { f: g, children } => Plan::FlatMap {
                f: Arc::new(move |v| Ok(g(v)?.map_fn(f.clone()))),
                children,
            },
            source @ Plan::Source(_) => Plan::Map {
                f,
                children: vec![source],
            },
        }
    }

    fn flat_map_fn(self, f: BindFn) -> Plan {
        match self {
            Plan::Wrap(inner) => Plan::FlatMap {
                f,
                children: vec![*inner],
            },
            Plan::Map { f: g, children } => Plan::FlatMap {
                f: bind_after(f, g),
                children,
            },
            Plan::FlatMap { f: g, children } => Plan::FlatMap {
                f: Arc::new(move |v| Ok(g(v)?.flat_map_fn(f.clone()))),
                children,
            },
            leaf => Plan::FlatMap {
                f,
                children: vec![leaf],
            },
        }
    }

    fn map_all_fn(mut children: Vec<Plan>, f: MapFn) -> Plan {
        if children.len() == 1 && children[0].fuses() {
            children.remove(0).map_fn(f)
        } else {
            Plan::Map { f, children }
        }
    }

    fn flat_map_all_fn(mut children: Vec<Plan>, f: BindFn) -> Plan {
        if children.len() == 1 && children[0].fuses() {
            children.remove(0).flat_map_fn(f)
        } else {
            Plan::FlatMap { f, children }
        }
    }

    /// Whether composing a function onto this node flattens instead of
    /// nesting. Source leaves always get a fresh node.
    fn fuses(&self) -> bool {
        !matches!(self, Plan::Source(_))
    }
}

fn compose(f: MapFn, g: MapFn) -> MapFn {
    Arc::new(move |v| f(g(v)?))
}

fn bind_after(f: BindFn, g: MapFn) -> BindFn {
    Arc::new(move |v| f(g(v)?))
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Done(v) => f.debug_tuple("Done").field(v).finish(),
            Plan::Wrap(inner) => f.debug_tuple("Wrap").field(inner).finish(),
            Plan::Map { children, .. } => f.debug_struct("Map").field("children", children).finish(),
            Plan::FlatMap { children, .. } => {
                f.debug_struct("FlatMap").field("children", children).finish()
            }
            Plan::Source(req) => f.debug_tuple("Source").field(req).finish(),
        }
    }
}
