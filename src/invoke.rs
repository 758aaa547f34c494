//! Uniform invocation surface over handler and sub-graph vertices.
//!
//! Dispatches to the handler function or, for sub-graph vertices, builds the
//! sub-payload via the configured projection and delegates to the injected
//! [`SubgraphRunner`]. Routers never pass through here: they are pure
//! functions evaluated synchronously during merge/route evaluation.
//!
//! User code runs inside a spawned task, so raised errors and panics both
//! surface as a failed result - nothing escapes synchronously into the
//! execution wiring.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::ExecutionError;
use crate::graph::{Vertex, VertexKind};
use crate::handler::{HandlerError, SubgraphRunner};

pub(crate) async fn invoke_vertex<P: Send + Sync + 'static>(
    vertex: &Vertex<P>,
    payload: Arc<P>,
    subgraph_runner: Option<Arc<dyn SubgraphRunner>>,
) -> Result<Value, ExecutionError> {
    let name = vertex.name().to_string();
    let task = match &vertex.kind {
        VertexKind::Handler { handler, .. } => {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle(payload).await })
        }
        VertexKind::Subgraph { projection, .. } => {
            let projection = projection.clone();
            tokio::spawn(async move {
                let runner = subgraph_runner
                    .ok_or_else(|| HandlerError::msg("no sub-graph runner configured"))?;
                let sub_payload = projection.project(payload.as_ref())?;
                runner.run(sub_payload).await
            })
        }
        VertexKind::MergePoint { .. } | VertexKind::Router { .. } => {
            return Err(ExecutionError::IllegalGraphState {
                detail: format!("vertex {name} has no handling phase"),
            });
        }
    };

    match task.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ExecutionError::Invocation {
            vertex: name,
            detail: err.to_string(),
        }),
        Err(join_err) => Err(ExecutionError::Invocation {
            vertex: name,
            detail: if join_err.is_panic() {
                "handler panicked".to_string()
            } else {
                format!("handler task failed: {join_err}")
            },
        }),
    }
}
