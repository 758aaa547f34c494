//! Per-submission construction of the live execution graph.
//!
//! Each submitted payload gets one mutable processing vertex per graph vertex.
//! Dependencies between them are [`Deferred`] slots wired before anything can
//! run: classifier tasks derive each outgoing transition from its parent's
//! merging slot, join tasks fire once *all* of a vertex's incoming flows have
//! settled, and a drain force-completes every still-pending dependency the
//! moment the overall result settles, so the future graph never hangs.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use super::context::{classify_handle, classify_merge, FlowContext, HandleContext, MergeContext, TransitionContext};
use super::deferred::Deferred;
use super::evaluator::merging_join;
use super::handle::{ExecutionHandle, VertexProbe};
use super::handling::handling_join;
use crate::errors::ExecutionError;
use crate::graph::{Graph, ResolvedTarget};
use crate::handler::{Payload, SubgraphRunner};
use crate::reactor::ReactorConfig;
use crate::telemetry::{Profiler, Tracer};

/// Immutable environment shared by every task of one execution.
pub(crate) struct ExecutionEnv<P> {
    pub(crate) graph: Arc<Graph<P>>,
    pub(crate) config: ReactorConfig,
    pub(crate) profiler: Arc<dyn Profiler>,
    pub(crate) tracer: Arc<dyn Tracer>,
    pub(crate) subgraph_runner: Option<Arc<dyn SubgraphRunner>>,
    pub(crate) execution_id: Uuid,
}

/// Live mirror of one graph vertex, exclusively owned by one execution.
pub(crate) struct ProcVertex<P> {
    pub(crate) handling_deps: Vec<Deferred<TransitionContext<P>>>,
    pub(crate) merging_deps: Vec<Deferred<MergeContext<P>>>,
    /// `None` for detached merge points and routers.
    pub(crate) handling: Option<Deferred<HandleContext<P>>>,
    pub(crate) merging: Deferred<MergeContext<P>>,
}

/// Complete the execution result with a failure. Losing the completion race
/// is fine: the first settlement wins and late failures are dropped.
pub(crate) fn fail_result<P>(
    result: &Deferred<Result<Arc<P>, ExecutionError>>,
    error: ExecutionError,
) {
    if !result.complete(Err(error)) {
        tracing::debug!("execution result already settled; late failure dropped");
    }
}

/// Instantiate the execution graph for `env` and return its handle.
pub(crate) fn build_execution<P: Payload>(env: ExecutionEnv<P>) -> ExecutionHandle<P> {
    let env = Arc::new(env);
    let graph = env.graph.clone();
    let vertex_count = graph.vertex_count();
    let execution_id = env.execution_id;

    let seed: Deferred<TransitionContext<P>> = Deferred::new();
    let result: Deferred<Result<Arc<P>, ExecutionError>> = Deferred::new();
    let drained: Deferred<()> = Deferred::new();

    // Step 1: one processing vertex per graph vertex, index-aligned.
    let mut vertices: Vec<ProcVertex<P>> = (0..vertex_count)
        .map(|id| ProcVertex {
            handling_deps: Vec::new(),
            merging_deps: Vec::new(),
            handling: graph.vertex(id).has_handling_phase().then(Deferred::new),
            merging: Deferred::new(),
        })
        .collect();

    // Step 2: seed the start vertices from the submission. Detached start
    // vertices have no handling phase, so the seed is adapted into a merging
    // flow for them.
    for &id in &graph.start {
        if graph.vertex(id).has_handling_phase() {
            vertices[id].handling_deps.push(seed.clone());
        } else {
            let dep = Deferred::new();
            vertices[id].merging_deps.push(dep.clone());
            let seed = seed.clone();
            tokio::spawn(async move {
                let context = match seed.wait().await {
                    FlowContext::Active { payload, .. } => FlowContext::active(payload, None),
                    FlowContext::Dead => FlowContext::Dead,
                    FlowContext::Terminal => FlowContext::Terminal,
                };
                dep.complete(context);
            });
        }
    }

    // Step 3: derive the outgoing transitions of every mergeable vertex from
    // its merging slot. Terminal transitions are resolved inside the
    // evaluator and wire nothing here.
    let mut derived_edges = 0usize;
    for id in 0..vertex_count {
        let vertex = graph.vertex(id);
        if !vertex.is_mergeable() {
            continue;
        }
        for (t, transition) in vertex.transitions.iter().enumerate() {
            match transition.kind {
                ResolvedTarget::Complete => {}
                ResolvedTarget::HandleBy(target) => {
                    let dep = Deferred::new();
                    vertices[target].handling_deps.push(dep.clone());
                    derived_edges += 1;
                    let parent = vertices[id].merging.clone();
                    let graph = graph.clone();
                    tokio::spawn(async move {
                        let context = parent.wait().await;
                        let condition = &graph.vertex(id).transitions[t].condition;
                        dep.complete(classify_handle(&context, condition));
                    });
                }
                ResolvedTarget::MergeBy(target) => {
                    let dep = Deferred::new();
                    vertices[target].merging_deps.push(dep.clone());
                    derived_edges += 1;
                    let parent = vertices[id].merging.clone();
                    let graph = graph.clone();
                    tokio::spawn(async move {
                        let context = parent.wait().await;
                        let condition = &graph.vertex(id).transitions[t].condition;
                        dep.complete(classify_merge(&context, condition));
                    });
                }
            }
        }
    }
    tracing::debug!(
        execution = %execution_id,
        vertices = vertex_count,
        derived_edges,
        "execution graph wired"
    );

    // Dependency lists are final; freeze them for the join tasks.
    let vertices = Arc::new(vertices);

    // Steps 4 and 5: join incoming flows per vertex.
    for id in 0..vertex_count {
        let vertex = graph.vertex(id);
        if vertex.has_handling_phase() {
            let span = tracing::debug_span!(
                "handling",
                execution = %execution_id,
                vertex = vertex.name()
            );
            tokio::spawn(
                handling_join(env.clone(), vertices.clone(), id, result.clone()).instrument(span),
            );
        }
        let span = tracing::debug_span!(
            "merging",
            execution = %execution_id,
            vertex = vertex.name()
        );
        tokio::spawn(
            merging_join(env.clone(), vertices.clone(), id, result.clone()).instrument(span),
        );
    }

    // Step 6: once the result settles - by any path - force-complete every
    // still-pending dependency with a dead context so unrelated branches
    // cannot keep the graph pending forever.
    {
        let result = result.clone();
        let vertices = vertices.clone();
        tokio::spawn(async move {
            let _ = result.wait().await;
            let mut drained_deps = 0usize;
            for vertex in vertices.iter() {
                for dep in &vertex.handling_deps {
                    if dep.complete(FlowContext::Dead) {
                        drained_deps += 1;
                    }
                }
                for dep in &vertex.merging_deps {
                    if dep.complete(FlowContext::Dead) {
                        drained_deps += 1;
                    }
                }
            }
            tracing::debug!(
                execution = %execution_id,
                drained_deps,
                "result settled; remaining dependencies drained"
            );
        });
    }

    // Step 7: the drained future settles once every handling slot has.
    {
        let drained = drained.clone();
        let slots: Vec<Deferred<HandleContext<P>>> = vertices
            .iter()
            .filter_map(|vertex| vertex.handling.clone())
            .collect();
        tokio::spawn(async move {
            join_all(slots.iter().map(Deferred::wait)).await;
            drained.complete(());
        });
    }

    let probes = env.config.debug_execution_state.then(|| {
        vertices
            .iter()
            .enumerate()
            .map(|(id, vertex)| VertexProbe {
                name: graph.vertex(id).name().to_string(),
                handling: vertex.handling.clone(),
                merging: vertex.merging.clone(),
            })
            .collect()
    });

    ExecutionHandle {
        execution_id,
        seed,
        result,
        drained,
        probes,
    }
}
