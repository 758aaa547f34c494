//! Merging phase: join, merge invocation, and status routing.
//!
//! The merging join of a vertex waits for its own handling slot (when it has
//! one) plus every incoming merging flow, applies the same precedence as the
//! handling join (terminal beats dead beats active, exactly one active flow
//! carries the payload), then invokes the merger or router exactly once and
//! routes its status onto the outgoing transitions.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;

use super::builder::{fail_result, ExecutionEnv, ProcVertex};
use super::context::{FlowContext, MergeContext};
use super::deferred::Deferred;
use crate::errors::{ExecutionError, FlowPhase};
use crate::graph::{MergeStatus, Vertex, VertexId, VertexKind};
use crate::handler::{DetachedMerger, HandlerError, Merger, Payload, Router};
use crate::telemetry::{dump_payload, shielded, MERGE_CALL_PREFIX};

/// Join the merging inputs of one vertex and drive its merging slot to
/// exactly one settlement.
pub(crate) async fn merging_join<P: Payload>(
    env: Arc<ExecutionEnv<P>>,
    vertices: Arc<Vec<ProcVertex<P>>>,
    id: VertexId,
    result: Deferred<Result<Arc<P>, ExecutionError>>,
) {
    let pvx = &vertices[id];
    let vertex = env.graph.vertex(id);
    let merging = &pvx.merging;

    // Own handling outcome first; detached merge points and routers have none.
    let handled: Option<(Arc<P>, Value)> = match &pvx.handling {
        Some(slot) => match slot.wait().await {
            FlowContext::Terminal => {
                merging.complete(FlowContext::Terminal);
                return;
            }
            FlowContext::Dead => {
                merging.complete(FlowContext::Dead);
                return;
            }
            FlowContext::Active { payload, carry } => Some((payload, carry)),
        },
        None => None,
    };

    let incoming: Vec<MergeContext<P>> =
        join_all(pvx.merging_deps.iter().map(Deferred::wait)).await;

    if incoming.iter().any(MergeContext::is_terminal) {
        merging.complete(FlowContext::Terminal);
        return;
    }

    // Terminal flows were handled above, so the remaining live flows are
    // exactly the payload-bearing ones.
    let active: Vec<&Arc<P>> = incoming.iter().filter_map(MergeContext::payload).collect();

    match handled {
        // Detached merge point or router: the payload comes from the single
        // active merging flow.
        None => match active.as_slice() {
            [] => {
                if incoming.is_empty() {
                    let error = ExecutionError::IllegalGraphState {
                        detail: format!(
                            "detached vertex {} settled with no incoming merging flows",
                            vertex.name()
                        ),
                    };
                    tracing::error!(vertex = vertex.name(), error = %error, "merging join failed");
                    fail_result(&result, error);
                    merging.complete(FlowContext::Terminal);
                } else {
                    merging.complete(FlowContext::Dead);
                }
            }
            [payload] => {
                evaluate_merge(&env, vertex, merging, None, (*payload).clone(), &result);
            }
            _ => fail_ambiguous(vertex, merging, &result),
        },
        // Handler / sub-graph vertex: its own result participates; the
        // payload comes from the handling slot unless merging flows feed it.
        Some((handled_payload, handler_result)) => {
            if incoming.is_empty() {
                evaluate_merge(
                    &env,
                    vertex,
                    merging,
                    Some(&handler_result),
                    handled_payload,
                    &result,
                );
                return;
            }
            match active.as_slice() {
                [] => {
                    merging.complete(FlowContext::Dead);
                }
                [payload] => {
                    evaluate_merge(
                        &env,
                        vertex,
                        merging,
                        Some(&handler_result),
                        (*payload).clone(),
                        &result,
                    );
                }
                _ => fail_ambiguous(vertex, merging, &result),
            }
        }
    }
}

fn fail_ambiguous<P: Payload>(
    vertex: &Vertex<P>,
    merging: &Deferred<MergeContext<P>>,
    result: &Deferred<Result<Arc<P>, ExecutionError>>,
) {
    let error = ExecutionError::AmbiguousIncomingFlow {
        vertex: vertex.name().to_string(),
        phase: FlowPhase::Merging,
    };
    tracing::error!(vertex = vertex.name(), error = %error, "ambiguous incoming merging flows");
    fail_result(result, error);
    merging.complete(FlowContext::Terminal);
}

enum MergeOp<'a, P> {
    Merger(&'a Arc<dyn Merger<P>>, &'a Value),
    Detached(&'a Arc<dyn DetachedMerger<P>>),
    Route(&'a Arc<dyn Router<P>>),
}

/// Invoke the merge function of a vertex and route its status.
///
/// Mergers mutate a private clone of the payload; the merged copy is what
/// flows onward, so sibling branches never observe a half-merged payload.
fn evaluate_merge<P: Payload>(
    env: &ExecutionEnv<P>,
    vertex: &Vertex<P>,
    merging: &Deferred<MergeContext<P>>,
    handler_result: Option<&Value>,
    payload: Arc<P>,
    result: &Deferred<Result<Arc<P>, ExecutionError>>,
) {
    let name = vertex.name();

    let op = match &vertex.kind {
        VertexKind::Handler { merger, .. } | VertexKind::Subgraph { merger, .. } => {
            match (merger, handler_result) {
                // No merger configured: this branch ends here.
                (None, _) => {
                    merging.complete(FlowContext::Dead);
                    return;
                }
                (Some(merger), Some(value)) => MergeOp::Merger(merger, value),
                (Some(_), None) => {
                    let error = ExecutionError::IllegalGraphState {
                        detail: format!("no handler result available for merger at vertex {name}"),
                    };
                    tracing::error!(vertex = name, error = %error, "merge evaluation failed");
                    fail_result(result, error);
                    merging.complete(FlowContext::Terminal);
                    return;
                }
            }
        }
        VertexKind::MergePoint { merger } => MergeOp::Detached(merger),
        VertexKind::Router { router } => MergeOp::Route(router),
    };

    let call = shielded("profiler.begin", || {
        env.profiler.begin(&format!("{MERGE_CALL_PREFIX}{name}"))
    });
    let mark = shielded("tracer.before_merge", || env.tracer.before_merge(name)).flatten();

    let merged: Result<(Arc<P>, MergeStatus), HandlerError> = match op {
        MergeOp::Merger(merger, value) => {
            let mut next = payload.as_ref().clone();
            merger
                .merge(&mut next, value)
                .map(|status| (Arc::new(next), status))
        }
        MergeOp::Detached(merger) => {
            let mut next = payload.as_ref().clone();
            merger.merge(&mut next).map(|status| (Arc::new(next), status))
        }
        MergeOp::Route(router) => router
            .route(payload.as_ref())
            .map(|status| (payload.clone(), status)),
    };

    if let Some(call) = call {
        shielded("profiler.stop", || call.stop());
    }
    if let Some(mark) = mark {
        shielded("tracer.after_merge", || env.tracer.after_merge(mark, name));
    }

    let (payload, status) = match merged {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(
                vertex = name,
                error = %err,
                payload = %dump_payload(payload.as_ref()),
                "merge failed"
            );
            fail_result(
                result,
                ExecutionError::Invocation {
                    vertex: name.to_string(),
                    detail: format!("merge failed: {err}"),
                },
            );
            merging.complete(FlowContext::Dead);
            return;
        }
    };

    tracing::debug!(vertex = name, status = %status, "merge status resolved");

    let matching: Vec<_> = vertex
        .transitions
        .iter()
        .filter(|transition| transition.condition.matches(&status))
        .collect();

    if matching.is_empty() {
        let declared = vertex
            .transitions
            .iter()
            .map(|transition| transition.condition.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let error = ExecutionError::UnmatchedMergeStatus {
            vertex: name.to_string(),
            status,
            declared: if declared.is_empty() {
                "none".to_string()
            } else {
                declared
            },
        };
        tracing::error!(
            vertex = name,
            error = %error,
            payload = %dump_payload(payload.as_ref()),
            "merge status matched no transition"
        );
        fail_result(result, error);
        merging.complete(FlowContext::Terminal);
        return;
    }

    if matching.iter().any(|transition| transition.is_complete()) {
        if !result.complete(Ok(payload)) {
            tracing::warn!(
                vertex = name,
                "execution completed by more than one terminal transition; first result wins"
            );
        }
        merging.complete(FlowContext::Terminal);
    } else {
        merging.complete(FlowContext::active(payload, Some(status)));
    }
}
