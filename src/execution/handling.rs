//! Handling phase of a processing vertex.
//!
//! The join fires once every incoming handling dependency has settled - never
//! on the first arrival - and requires exactly one active payload-bearing
//! flow. Arrival order of the contending futures is irrelevant: only the
//! final settled set decides.

use std::sync::Arc;

use futures_util::future::join_all;

use super::builder::{fail_result, ExecutionEnv, ProcVertex};
use super::context::{FlowContext, HandleContext, TransitionContext};
use super::deferred::Deferred;
use crate::errors::{ExecutionError, FlowPhase};
use crate::graph::{Vertex, VertexId};
use crate::handler::Payload;
use crate::immutability::{self, ImmutabilityControlLevel};
use crate::invoke::invoke_vertex;
use crate::telemetry::{dump_payload, shielded, HANDLE_CALL_PREFIX};

/// Join all incoming handling flows of one vertex and drive its handling
/// slot to exactly one settlement.
pub(crate) async fn handling_join<P: Payload>(
    env: Arc<ExecutionEnv<P>>,
    vertices: Arc<Vec<ProcVertex<P>>>,
    id: VertexId,
    result: Deferred<Result<Arc<P>, ExecutionError>>,
) {
    let pvx = &vertices[id];
    let vertex = env.graph.vertex(id);
    let Some(slot) = &pvx.handling else {
        tracing::error!(vertex = vertex.name(), "handling join reached a detached vertex");
        return;
    };

    let incoming: Vec<TransitionContext<P>> =
        join_all(pvx.handling_deps.iter().map(Deferred::wait)).await;

    if incoming.iter().any(TransitionContext::is_terminal) {
        slot.complete(FlowContext::Terminal);
        return;
    }

    // Terminal flows were handled above, so the remaining live flows are
    // exactly the payload-bearing ones.
    let active: Vec<&Arc<P>> = incoming.iter().filter_map(TransitionContext::payload).collect();
    match active.as_slice() {
        [] => {
            // No live flow reached this vertex; the handler is not invoked.
            tracing::debug!(vertex = vertex.name(), "no active incoming flow; vertex dead");
            slot.complete(FlowContext::Dead);
        }
        [payload] => {
            run_handling(&env, vertex, (*payload).clone(), slot, &result).await;
        }
        _ => {
            // Two flows both carried a payload in. Picking one would depend
            // on arrival order and could lose computation results, so the
            // execution fails instead.
            let error = ExecutionError::AmbiguousIncomingFlow {
                vertex: vertex.name().to_string(),
                phase: FlowPhase::Handling,
            };
            tracing::error!(vertex = vertex.name(), error = %error, "ambiguous incoming handling flows");
            fail_result(&result, error);
            slot.complete(FlowContext::Terminal);
        }
    }
}

/// Invoke the vertex on its single active payload, wrapped by the mutation
/// guard and the telemetry hooks.
async fn run_handling<P: Payload>(
    env: &ExecutionEnv<P>,
    vertex: &Vertex<P>,
    payload: Arc<P>,
    slot: &Deferred<HandleContext<P>>,
    result: &Deferred<Result<Arc<P>, ExecutionError>>,
) {
    let name = vertex.name();

    let call = shielded("profiler.begin", || {
        env.profiler.begin(&format!("{HANDLE_CALL_PREFIX}{name}"))
    });
    let mark = shielded("tracer.before_handle", || env.tracer.before_handle(name)).flatten();
    let snapshot = match env.config.immutability {
        ImmutabilityControlLevel::NoControl => None,
        _ => immutability::take_snapshot(payload.as_ref()),
    };

    let outcome = invoke_vertex(vertex, payload.clone(), env.subgraph_runner.clone()).await;

    if let Some(call) = call {
        shielded("profiler.stop", || call.stop());
    }
    if let Some(mark) = mark {
        let failed = outcome.is_err();
        shielded("tracer.after_handle", || {
            env.tracer.after_handle(mark, name, failed)
        });
    }

    let outcome = check_mutation(env, name, &payload, snapshot, outcome);

    match outcome {
        Ok(value) => {
            slot.complete(FlowContext::active(payload, value));
        }
        Err(error) => {
            tracing::error!(
                vertex = name,
                error = %error,
                payload = %dump_payload(payload.as_ref()),
                "handling failed"
            );
            fail_result(result, error);
            slot.complete(FlowContext::Terminal);
        }
    }
}

/// Apply the configured immutability control to a finished invocation.
fn check_mutation<P: Payload>(
    env: &ExecutionEnv<P>,
    vertex: &str,
    payload: &Arc<P>,
    snapshot: Option<immutability::PayloadSnapshot>,
    outcome: Result<serde_json::Value, ExecutionError>,
) -> Result<serde_json::Value, ExecutionError> {
    let Some(snapshot) = snapshot else {
        return outcome;
    };
    let Some(found) = immutability::diff(&snapshot, payload.as_ref()) else {
        return outcome;
    };
    match env.config.immutability {
        ImmutabilityControlLevel::NoControl => outcome,
        ImmutabilityControlLevel::LogWarn => {
            tracing::warn!(vertex, diff = %found, "payload mutated during handling");
            outcome
        }
        ImmutabilityControlLevel::LogError => {
            tracing::error!(vertex, diff = %found, "payload mutated during handling");
            outcome
        }
        ImmutabilityControlLevel::Raise => {
            if outcome.is_err() {
                tracing::warn!(
                    vertex,
                    "handling failure superseded by immutability violation"
                );
            }
            Err(ExecutionError::ImmutabilityViolation {
                vertex: vertex.to_string(),
                diff: found,
            })
        }
    }
}
