//! Per-submission execution graph and its externally visible handle.
//!
//! When a payload is submitted, the engine instantiates one mutable
//! processing vertex per graph vertex and wires single-assignment dependency
//! futures between them:
//!
//! 1. The submission completes a seed context feeding the start vertices.
//! 2. Classifier tasks derive every outgoing transition from its parent's
//!    merging slot: terminal and dead propagate, a matching merge status
//!    activates the edge, anything else marks it dead.
//! 3. Each vertex joins *all* of its incoming flows, requires exactly one
//!    active payload-bearing flow, then handles and merges.
//! 4. The first terminal transition completes the result; a drain then
//!    force-completes every still-pending dependency so the execution graph
//!    always fully settles.
//!
//! The only coordination primitive is [`Deferred`], a write-once multi-waiter
//! future slot - there are no locks anywhere in the engine.

mod builder;
mod context;
mod deferred;
mod evaluator;
mod handle;
mod handling;

pub use context::{FlowContext, HandleContext, MergeContext, TransitionContext};
pub use deferred::Deferred;
pub use handle::{ExecutionHandle, SlotState, VertexState};

pub(crate) use builder::{build_execution, ExecutionEnv};
