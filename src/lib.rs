//! # Reactograph: Graph-driven Asynchronous Execution Runtime
//!
//! Reactograph executes a user-declared, immutable processing graph against a
//! single submitted payload, producing exactly one terminal result per
//! execution. Vertices (handlers, sub-graphs, mergers, routers) are connected
//! by conditional transitions keyed by merge statuses; many vertices run
//! concurrently while the engine guarantees a single race-free completion.
//!
//! ## Core Concepts
//!
//! - **Graph**: Immutable description of vertices and transitions, built once
//!   and shared read-only by all executions
//! - **Handlers**: Async units of work that read the payload and produce a result
//! - **Mergers**: Synchronous functions that fold a handler result into the
//!   payload and return a merge status
//! - **Routers**: Pure routing functions selecting the active branch by payload
//! - **Execution**: A per-submission mirror graph of single-assignment future
//!   slots, wired so each vertex fires once all of its dependencies settle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde::Serialize;
//! use serde_json::{json, Value};
//! use reactograph::graph::{GraphBuilder, MergeStatus, Transition};
//! use reactograph::handler::{Handler, HandlerError, Merger};
//! use reactograph::reactor::Reactor;
//!
//! #[derive(Clone, Serialize)]
//! struct Ids {
//!     seen: Vec<i64>,
//! }
//!
//! struct IdHandler(i64);
//!
//! #[async_trait]
//! impl Handler<Ids> for IdHandler {
//!     async fn handle(&self, _payload: Arc<Ids>) -> Result<Value, HandlerError> {
//!         Ok(json!(self.0))
//!     }
//! }
//!
//! struct IdMerger;
//!
//! impl Merger<Ids> for IdMerger {
//!     fn merge(&self, payload: &mut Ids, result: &Value) -> Result<MergeStatus, HandlerError> {
//!         payload.seen.push(result.as_i64().unwrap_or_default());
//!         Ok(MergeStatus::from("ok"))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphBuilder::new()
//!     .add_handler_with_merger("collect", IdHandler(1), IdMerger)
//!     .start_at("collect")
//!     .transition("collect", Transition::on_any().complete())
//!     .build()?;
//!
//! let reactor = Reactor::new(graph);
//! let result = reactor.execute(Ids { seen: vec![] }).await?;
//! assert_eq!(result.seen, vec![1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution Lifecycle
//!
//! Submitting a payload instantiates one processing vertex per graph vertex and
//! wires dependency futures between them. Each vertex joins *all* of its
//! incoming flows, requires exactly one active payload-bearing flow, invokes
//! its handler, then merges and routes. Branches whose transition conditions do
//! not match are marked dead and propagate deadness downstream; a terminal
//! transition completes the execution result and drains every still-pending
//! dependency so the future graph always fully settles.
//!
//! ## Module Guide
//!
//! - [`graph`] - Graph model and the fluent authoring builder
//! - [`handler`] - User-facing handler / merger / router / sub-graph traits
//! - [`execution`] - Per-submission execution graph, handle, and future slots
//! - [`reactor`] - The entry-point façade binding a graph to its collaborators
//! - [`immutability`] - Payload mutation detection between snapshots
//! - [`telemetry`] - Profiler and tracer hook interfaces
//! - [`errors`] - Execution-time error taxonomy

pub mod errors;
pub mod execution;
pub mod graph;
pub mod handler;
pub mod immutability;
pub mod reactor;
pub mod telemetry;

mod invoke;
