//! Entry-point façade binding an immutable graph to its collaborators.
//!
//! A [`Reactor`] owns one [`Graph`] plus the configuration and external
//! collaborators (profiler, tracer, sub-graph runner) shared by all of its
//! executions. It is cheap to clone and safe to share: every submission gets
//! its own isolated execution graph.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::errors::ExecutionError;
use crate::execution::{build_execution, ExecutionEnv, ExecutionHandle};
use crate::graph::Graph;
use crate::handler::{Payload, SubgraphRunner};
use crate::immutability::ImmutabilityControlLevel;
use crate::telemetry::{NoopProfiler, NoopTracer, Profiler, Tracer};

/// Per-reactor configuration, passed in at construction.
///
/// Concurrent reactors with different settings coexist freely; nothing here
/// is process-global.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReactorConfig {
    /// How payload mutation during handling is treated.
    pub immutability: ImmutabilityControlLevel,
    /// Expose per-vertex slot states on execution handles. Keeps the internal
    /// processing vertices alive as long as the handle, so leave this off
    /// outside of debugging.
    pub debug_execution_state: bool,
}

/// Executes submissions against one immutable graph.
///
/// # Examples
///
/// ```rust,no_run
/// use reactograph::reactor::{Reactor, ReactorConfig};
/// use reactograph::immutability::ImmutabilityControlLevel;
///
/// # async fn example(graph: reactograph::graph::Graph<u32>) -> miette::Result<()> {
/// let reactor = Reactor::new(graph).with_config(ReactorConfig {
///     immutability: ImmutabilityControlLevel::Raise,
///     debug_execution_state: false,
/// });
///
/// let result = reactor.execute(7).await;
/// # Ok(())
/// # }
/// ```
pub struct Reactor<P> {
    graph: Arc<Graph<P>>,
    config: ReactorConfig,
    profiler: Arc<dyn Profiler>,
    tracer: Arc<dyn Tracer>,
    subgraph_runner: Option<Arc<dyn SubgraphRunner>>,
}

impl<P> Clone for Reactor<P> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            config: self.config,
            profiler: self.profiler.clone(),
            tracer: self.tracer.clone(),
            subgraph_runner: self.subgraph_runner.clone(),
        }
    }
}

impl<P: Payload> Reactor<P> {
    /// Wrap a graph with default configuration and no-op collaborators.
    #[must_use]
    pub fn new(graph: Graph<P>) -> Self {
        Self {
            graph: Arc::new(graph),
            config: ReactorConfig::default(),
            profiler: Arc::new(NoopProfiler),
            tracer: Arc::new(NoopTracer),
            subgraph_runner: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ReactorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_profiler(mut self, profiler: impl Profiler + 'static) -> Self {
        self.profiler = Arc::new(profiler);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Inject the collaborator that runs sub-graph vertices. Required when
    /// the graph contains sub-graph vertices; their invocations fail without
    /// it.
    #[must_use]
    pub fn with_subgraph_runner(mut self, runner: impl SubgraphRunner + 'static) -> Self {
        self.subgraph_runner = Some(Arc::new(runner));
        self
    }

    /// The shared graph model.
    #[must_use]
    pub fn graph(&self) -> &Arc<Graph<P>> {
        &self.graph
    }

    /// Instantiate an execution without submitting a payload yet.
    #[must_use]
    pub fn start_execution(&self) -> ExecutionHandle<P> {
        let execution_id = Uuid::new_v4();
        tracing::debug!(execution = %execution_id, "starting execution");
        build_execution(ExecutionEnv {
            graph: self.graph.clone(),
            config: self.config,
            profiler: self.profiler.clone(),
            tracer: self.tracer.clone(),
            subgraph_runner: self.subgraph_runner.clone(),
            execution_id,
        })
    }

    /// Instantiate an execution and submit `payload` to it.
    #[must_use]
    pub fn submit(&self, payload: P) -> ExecutionHandle<P> {
        let handle = self.start_execution();
        handle.submit(payload);
        handle
    }

    /// Submit `payload` and wait for the execution result.
    #[instrument(skip(self, payload), fields(vertices = self.graph.vertex_count()))]
    pub async fn execute(&self, payload: P) -> Result<Arc<P>, ExecutionError> {
        self.submit(payload).result().await
    }
}
