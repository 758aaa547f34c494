//! Execution-time error taxonomy.
//!
//! Build-time defects surface as
//! [`ConfigurationError`](crate::graph::ConfigurationError); everything here
//! fails a running execution. Errors are cloneable because they settle a
//! single-assignment result slot observed by any number of waiters.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::graph::MergeStatus;

/// Phase of the per-vertex lifecycle in which a defect was detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowPhase {
    Handling,
    Merging,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handling => write!(f, "handling"),
            Self::Merging => write!(f, "merging"),
        }
    }
}

/// Errors that fail a running execution.
///
/// Whatever the variant, the execution result settles exactly once and the
/// drain forces every remaining vertex slot to settle - partial hangs are a
/// bug class prevented by construction, not tolerated.
#[derive(Clone, Debug, Error, Diagnostic)]
pub enum ExecutionError {
    /// A handler, sub-graph, merger, or router raised or panicked.
    #[error("invocation failed at vertex {vertex}: {detail}")]
    #[diagnostic(code(reactograph::execution::invocation))]
    Invocation { vertex: String, detail: String },

    /// Internal consistency violation. Always an engine defect.
    #[error("illegal graph execution state: {detail}")]
    #[diagnostic(
        code(reactograph::execution::illegal_state),
        help("this indicates an engine defect; please report it together with the graph shape")
    )]
    IllegalGraphState { detail: String },

    /// More than one incoming flow carried a payload into the same vertex.
    /// The engine refuses to pick one: the winner would depend on arrival
    /// order and could lose computation results.
    #[error("more than one active incoming {phase} flow for vertex {vertex}")]
    #[diagnostic(
        code(reactograph::execution::ambiguous_incoming_flow),
        help("restructure the graph so at most one transition carries the payload into the vertex")
    )]
    AmbiguousIncomingFlow { vertex: String, phase: FlowPhase },

    /// A merger returned a status with no matching outgoing transition.
    #[error("merge status {status} at vertex {vertex} matches no outgoing transition; declared: {declared}")]
    #[diagnostic(
        code(reactograph::execution::unmatched_merge_status),
        help("declare a transition for every status the merger can return, or an on_any fallback")
    )]
    UnmatchedMergeStatus {
        vertex: String,
        status: MergeStatus,
        declared: String,
    },

    /// The payload was mutated while a handler held it and the configured
    /// control level promotes detections to failures.
    #[error("payload mutated during handling at vertex {vertex}: {diff}")]
    #[diagnostic(code(reactograph::execution::immutability_violation))]
    ImmutabilityViolation { vertex: String, diff: String },
}
