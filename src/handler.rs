//! User-facing traits for the functions a graph vertex dispatches to.
//!
//! Handlers are asynchronous and read-only over the payload; mergers are
//! synchronous and fold a handler result into the payload, returning the
//! [`MergeStatus`] that selects the active outgoing transition. Routers are
//! pure: they pick a status from the payload without mutating it. Sub-graph
//! vertices project a sub-payload and delegate to an injected
//! [`SubgraphRunner`] collaborator.
//!
//! # Error Handling
//!
//! All user functions report failures through [`HandlerError`]. The engine
//! converts a failure into a failed execution result; it never lets one escape
//! synchronously into the wiring.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use reactograph::graph::MergeStatus;
//! use reactograph::handler::{Handler, HandlerError, Merger};
//!
//! #[derive(Clone, serde::Serialize)]
//! struct Order {
//!     total_cents: i64,
//!     approved: bool,
//! }
//!
//! struct PriceCheck;
//!
//! #[async_trait]
//! impl Handler<Order> for PriceCheck {
//!     async fn handle(&self, payload: Arc<Order>) -> Result<Value, HandlerError> {
//!         Ok(json!(payload.total_cents < 10_000))
//!     }
//! }
//!
//! struct ApproveMerger;
//!
//! impl Merger<Order> for ApproveMerger {
//!     fn merge(&self, payload: &mut Order, result: &Value) -> Result<MergeStatus, HandlerError> {
//!         payload.approved = result.as_bool().unwrap_or(false);
//!         Ok(if payload.approved { "approved".into() } else { "rejected".into() })
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::graph::MergeStatus;

/// Blanket bound for payload types flowing through a graph.
///
/// `Clone` backs the copy-on-write merge step, `Serialize` backs mutation
/// snapshots and debug dumps.
pub trait Payload: Clone + Serialize + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Serialize + Send + Sync + 'static {}

/// Error raised by user-supplied handler, merger, router, or projection code.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(reactograph::handler))]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("serialization failed", err)
    }
}

/// Asynchronous unit of work attached to a handler vertex.
///
/// Receives the payload behind an `Arc`; the payload must not be mutated
/// during handling (see [`immutability`](crate::immutability)). The returned
/// value is handed to the vertex's merger, if any.
#[async_trait]
pub trait Handler<P>: Send + Sync {
    async fn handle(&self, payload: Arc<P>) -> Result<Value, HandlerError>;
}

/// Synchronous merge function of a handler or sub-graph vertex.
///
/// Folds the handler result into the payload and returns the status that
/// selects the active outgoing transition.
pub trait Merger<P>: Send + Sync {
    fn merge(&self, payload: &mut P, result: &Value) -> Result<MergeStatus, HandlerError>;
}

/// Merge function of a detached merge point, fed only by merging flows.
pub trait DetachedMerger<P>: Send + Sync {
    fn merge(&self, payload: &mut P) -> Result<MergeStatus, HandlerError>;
}

/// Pure routing function of a router vertex.
///
/// Evaluated synchronously inside the merge/route step; must not mutate the
/// payload.
pub trait Router<P>: Send + Sync {
    fn route(&self, payload: &P) -> Result<MergeStatus, HandlerError>;
}

/// Builds the sub-payload handed to the [`SubgraphRunner`] for a sub-graph
/// vertex.
pub trait SubgraphProjection<P>: Send + Sync {
    fn project(&self, payload: &P) -> Result<Value, HandlerError>;
}

/// Collaborator that runs a sub-graph to completion for one sub-payload.
///
/// Injected via
/// [`Reactor::with_subgraph_runner`](crate::reactor::Reactor::with_subgraph_runner);
/// invoked once per sub-graph vertex activation.
#[async_trait]
pub trait SubgraphRunner: Send + Sync {
    async fn run(&self, sub_payload: Value) -> Result<Value, HandlerError>;
}
