//! Externally visible handle of a running execution.

use std::sync::Arc;

use uuid::Uuid;

use super::context::{FlowContext, HandleContext, MergeContext, TransitionContext};
use super::deferred::Deferred;
use crate::errors::ExecutionError;

/// Settlement state of a vertex slot, as seen by the debug probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Active,
    Dead,
    Terminal,
}

/// Debug view of one processing vertex. Handling is `None` for detached
/// merge points and routers, which have no handling phase.
#[derive(Clone, Debug)]
pub struct VertexState {
    pub vertex: String,
    pub handling: Option<SlotState>,
    pub merging: SlotState,
}

pub(crate) struct VertexProbe<P> {
    pub(crate) name: String,
    pub(crate) handling: Option<Deferred<HandleContext<P>>>,
    pub(crate) merging: Deferred<MergeContext<P>>,
}

fn slot_state<P, C>(slot: &Deferred<FlowContext<P, C>>) -> SlotState {
    match slot.try_get() {
        None => SlotState::Pending,
        Some(FlowContext::Active { .. }) => SlotState::Active,
        Some(FlowContext::Dead) => SlotState::Dead,
        Some(FlowContext::Terminal) => SlotState::Terminal,
    }
}

/// Handle to one execution of a graph.
///
/// Exposes the submission sink, the result future, and a drained future that
/// resolves once every handling slot has settled - after which no further
/// handler invocation will start.
///
/// Dropping an unsubmitted handle releases the execution by feeding it a dead
/// seed, so the wired tasks settle instead of waiting forever.
pub struct ExecutionHandle<P> {
    pub(crate) execution_id: Uuid,
    pub(crate) seed: Deferred<TransitionContext<P>>,
    pub(crate) result: Deferred<Result<Arc<P>, ExecutionError>>,
    pub(crate) drained: Deferred<()>,
    pub(crate) probes: Option<Vec<VertexProbe<P>>>,
}

impl<P> ExecutionHandle<P> {
    #[must_use]
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Submit the payload. Exactly one submission is accepted per execution;
    /// returns `false` if a payload was already submitted.
    pub fn submit(&self, payload: P) -> bool {
        let accepted = self
            .seed
            .complete(FlowContext::active(Arc::new(payload), ()));
        if !accepted {
            tracing::warn!(
                execution = %self.execution_id,
                "payload already submitted; ignoring second submission"
            );
        }
        accepted
    }

    /// Wait for the execution result: the final payload of the first terminal
    /// transition, or the failure that ended the execution.
    pub async fn result(&self) -> Result<Arc<P>, ExecutionError> {
        self.result.wait().await
    }

    /// Wait until every handling slot has settled. Afterwards no handler
    /// invocation will start; engine-internal state can be safely released.
    pub async fn drained(&self) {
        self.drained.wait().await;
    }

    /// Per-vertex slot states, available only when
    /// [`debug_execution_state`](crate::reactor::ReactorConfig::debug_execution_state)
    /// is enabled.
    #[must_use]
    pub fn vertex_states(&self) -> Option<Vec<VertexState>> {
        self.probes.as_ref().map(|probes| {
            probes
                .iter()
                .map(|probe| VertexState {
                    vertex: probe.name.clone(),
                    handling: probe.handling.as_ref().map(slot_state),
                    merging: slot_state(&probe.merging),
                })
                .collect()
        })
    }
}

impl<P> Drop for ExecutionHandle<P> {
    fn drop(&mut self) {
        if !self.seed.is_complete() {
            tracing::debug!(
                execution = %self.execution_id,
                "handle dropped before submission; releasing execution with a dead seed"
            );
            self.seed.complete(FlowContext::Dead);
        }
    }
}
