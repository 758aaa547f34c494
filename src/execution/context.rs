//! Flow envelopes carried along execution-graph edges.
//!
//! One tagged type covers the three edge kinds: exactly one of
//! {active payload, dead, terminal} holds for any settled envelope, and
//! envelopes are immutable once completed into their [`Deferred`] slot.
//!
//! [`Deferred`]: super::Deferred

use std::sync::Arc;

use serde_json::Value;

use crate::graph::{MergeStatus, TransitionCondition};

/// A value flowing along an edge of the execution graph.
pub enum FlowContext<P, C> {
    /// The edge is active for this execution and carries the payload.
    Active { payload: Arc<P>, carry: C },
    /// The edge is inactive: a condition did not match, or an upstream branch
    /// died. Consumers ignore the payload and propagate deadness.
    Dead,
    /// The execution already reached a terminal transition. Consumers stop
    /// processing and propagate terminal-ness.
    Terminal,
}

impl<P, C: Clone> Clone for FlowContext<P, C> {
    fn clone(&self) -> Self {
        match self {
            Self::Active { payload, carry } => Self::Active {
                payload: payload.clone(),
                carry: carry.clone(),
            },
            Self::Dead => Self::Dead,
            Self::Terminal => Self::Terminal,
        }
    }
}

impl<P, C> FlowContext<P, C> {
    #[must_use]
    pub fn active(payload: Arc<P>, carry: C) -> Self {
        Self::Active { payload, carry }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Dead)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Arc<P>> {
        match self {
            Self::Active { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Envelope feeding a vertex's handling phase.
pub type TransitionContext<P> = FlowContext<P, ()>;

/// Settled handling phase: carries the raw handler / sub-graph result.
pub type HandleContext<P> = FlowContext<P, Value>;

/// Settled merging phase, or an envelope feeding one. The carried status is
/// the resolved merge status of the producing vertex; it is `None` only for
/// submission seeds adapted into merging flows.
pub type MergeContext<P> = FlowContext<P, Option<MergeStatus>>;

fn condition_applies(condition: &TransitionCondition, carry: &Option<MergeStatus>) -> bool {
    match carry {
        Some(status) => condition.matches(status),
        None => matches!(condition, TransitionCondition::OnAny),
    }
}

/// Classify a parent's settled merging context across a handle-target
/// transition: terminal and dead propagate, a matching status activates the
/// target's handling, anything else is a dead transition.
pub(crate) fn classify_handle<P>(
    parent: &MergeContext<P>,
    condition: &TransitionCondition,
) -> TransitionContext<P> {
    match parent {
        FlowContext::Terminal => FlowContext::Terminal,
        FlowContext::Dead => FlowContext::Dead,
        FlowContext::Active { payload, carry } => {
            if condition_applies(condition, carry) {
                FlowContext::active(payload.clone(), ())
            } else {
                FlowContext::Dead
            }
        }
    }
}

/// Classify a parent's settled merging context across a merge-target
/// transition. The parent's status travels with the payload.
pub(crate) fn classify_merge<P>(
    parent: &MergeContext<P>,
    condition: &TransitionCondition,
) -> MergeContext<P> {
    match parent {
        FlowContext::Terminal => FlowContext::Terminal,
        FlowContext::Dead => FlowContext::Dead,
        FlowContext::Active { payload, carry } => {
            if condition_applies(condition, carry) {
                FlowContext::active(payload.clone(), carry.clone())
            } else {
                FlowContext::Dead
            }
        }
    }
}
