//! Graph model and authoring for reactor executions.
//!
//! A [`Graph`] is the immutable description of vertices and transitions that
//! every execution of that graph shares read-only. It is produced once by the
//! fluent [`GraphBuilder`], which validates the declared topology and resolves
//! transition targets to vertex indices.
//!
//! # Core Concepts
//!
//! - **Vertices**: handlers, sub-graphs, detached merge points, and routers
//! - **Transitions**: conditional edges from a mergeable vertex, keyed by
//!   [`MergeStatus`], targeting either a handling phase, a merging phase, or
//!   completing the execution
//! - **Start vertices**: the entry points seeded by payload submission
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use reactograph::graph::{GraphBuilder, Transition};
//! use reactograph::handler::{Handler, HandlerError};
//!
//! struct Fetch;
//!
//! #[async_trait]
//! impl Handler<String> for Fetch {
//!     async fn handle(&self, _payload: Arc<String>) -> Result<Value, HandlerError> {
//!         Ok(Value::Null)
//!     }
//! }
//!
//! # fn example() -> Result<(), reactograph::graph::ConfigurationError> {
//! let graph = GraphBuilder::new()
//!     .add_handler("fetch", Fetch)
//!     .start_at("fetch")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod model;

pub use builder::{ConfigurationError, GraphBuilder};
pub use model::{
    Graph, MergeStatus, Transition, TransitionBuilder, TransitionCondition, VertexId,
};

pub(crate) use model::{ResolvedTarget, Vertex, VertexKind};
