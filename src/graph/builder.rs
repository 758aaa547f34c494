//! Fluent construction and validation of the immutable graph model.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::model::{
    Graph, ResolvedTarget, ResolvedTransition, Transition, TransitionTarget, Vertex, VertexKind,
};
use crate::handler::{DetachedMerger, Handler, Merger, Router, SubgraphProjection};

/// Errors detected while building a graph. All of these are authoring
/// defects, fatal at build time.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigurationError {
    #[error("duplicate vertex name: {name}")]
    #[diagnostic(code(reactograph::graph::duplicate_vertex))]
    DuplicateVertex { name: String },

    #[error("transition declared from unknown vertex: {name}")]
    #[diagnostic(code(reactograph::graph::unknown_source))]
    UnknownTransitionSource { name: String },

    #[error("transition from {from} targets unknown vertex: {target}")]
    #[diagnostic(code(reactograph::graph::unknown_target))]
    UnknownTransitionTarget { from: String, target: String },

    #[error("start vertex not found: {name}")]
    #[diagnostic(code(reactograph::graph::unknown_start))]
    UnknownStartVertex { name: String },

    #[error("graph has no start vertices")]
    #[diagnostic(
        code(reactograph::graph::no_start),
        help("declare at least one entry point with start_at")
    )]
    NoStartVertices,

    #[error("vertex {name} has no incoming handling flows")]
    #[diagnostic(
        code(reactograph::graph::no_incoming_handling),
        help("add a handle_by transition targeting this vertex, or list it in start_at")
    )]
    NoIncomingHandling { name: String },

    #[error("detached vertex {name} has no incoming merging flows")]
    #[diagnostic(
        code(reactograph::graph::no_incoming_merging),
        help("add a merge_by transition targeting this vertex, or list it in start_at")
    )]
    NoIncomingMerging { name: String },

    #[error("transition from {from} cannot handle_by {target}: target has no handling phase")]
    #[diagnostic(code(reactograph::graph::handle_target_detached))]
    HandleTargetDetached { from: String, target: String },

    #[error("transition from {from} cannot merge_by {target}: target has no merge capability")]
    #[diagnostic(code(reactograph::graph::merge_target_not_mergeable))]
    MergeTargetNotMergeable { from: String, target: String },

    #[error("vertex {name} declares outgoing transitions but has no merge capability")]
    #[diagnostic(
        code(reactograph::graph::transitions_without_merger),
        help("attach a merger to the vertex, or remove its transitions")
    )]
    TransitionsWithoutMerger { name: String },
}

struct VertexDraft<P> {
    name: String,
    kind: VertexKind<P>,
}

/// Builder for the immutable [`Graph`] consumed by executions.
///
/// Vertices, start points, and transitions can be declared in any order;
/// [`build`](Self::build) resolves names and validates the topology.
pub struct GraphBuilder<P> {
    vertices: Vec<VertexDraft<P>>,
    start: Vec<String>,
    transitions: Vec<(String, Transition)>,
}

impl<P> Default for GraphBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> GraphBuilder<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            start: Vec::new(),
            transitions: Vec::new(),
        }
    }

    fn add_vertex(mut self, name: impl Into<String>, kind: VertexKind<P>) -> Self {
        self.vertices.push(VertexDraft {
            name: name.into(),
            kind,
        });
        self
    }

    /// Add a handler vertex without a merger. Such a vertex ends its branch:
    /// it cannot declare outgoing transitions.
    #[must_use]
    pub fn add_handler(self, name: impl Into<String>, handler: impl Handler<P> + 'static) -> Self {
        self.add_vertex(
            name,
            VertexKind::Handler {
                handler: Arc::new(handler),
                merger: None,
            },
        )
    }

    /// Add a handler vertex whose result is folded into the payload by
    /// `merger`, producing the status that routes outgoing transitions.
    #[must_use]
    pub fn add_handler_with_merger(
        self,
        name: impl Into<String>,
        handler: impl Handler<P> + 'static,
        merger: impl Merger<P> + 'static,
    ) -> Self {
        self.add_vertex(
            name,
            VertexKind::Handler {
                handler: Arc::new(handler),
                merger: Some(Arc::new(merger)),
            },
        )
    }

    /// Add a sub-graph vertex without a merger.
    #[must_use]
    pub fn add_subgraph(
        self,
        name: impl Into<String>,
        projection: impl SubgraphProjection<P> + 'static,
    ) -> Self {
        self.add_vertex(
            name,
            VertexKind::Subgraph {
                projection: Arc::new(projection),
                merger: None,
            },
        )
    }

    /// Add a sub-graph vertex with a merger over the sub-graph result.
    #[must_use]
    pub fn add_subgraph_with_merger(
        self,
        name: impl Into<String>,
        projection: impl SubgraphProjection<P> + 'static,
        merger: impl Merger<P> + 'static,
    ) -> Self {
        self.add_vertex(
            name,
            VertexKind::Subgraph {
                projection: Arc::new(projection),
                merger: Some(Arc::new(merger)),
            },
        )
    }

    /// Add a detached merge point, fed only by merging flows.
    #[must_use]
    pub fn add_merge_point(
        self,
        name: impl Into<String>,
        merger: impl DetachedMerger<P> + 'static,
    ) -> Self {
        self.add_vertex(
            name,
            VertexKind::MergePoint {
                merger: Arc::new(merger),
            },
        )
    }

    /// Add a router vertex: a pure routing function over the payload.
    #[must_use]
    pub fn add_router(self, name: impl Into<String>, router: impl Router<P> + 'static) -> Self {
        self.add_vertex(
            name,
            VertexKind::Router {
                router: Arc::new(router),
            },
        )
    }

    /// Declare an entry point. The submitted payload is seeded into every
    /// start vertex.
    #[must_use]
    pub fn start_at(mut self, name: impl Into<String>) -> Self {
        self.start.push(name.into());
        self
    }

    /// Declare an outgoing transition of `from`.
    #[must_use]
    pub fn transition(mut self, from: impl Into<String>, transition: Transition) -> Self {
        self.transitions.push((from.into(), transition));
        self
    }

    /// Validate the declared topology and freeze it into a [`Graph`].
    pub fn build(self) -> Result<Graph<P>, ConfigurationError> {
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        for (id, draft) in self.vertices.iter().enumerate() {
            if index.insert(draft.name.clone(), id).is_some() {
                return Err(ConfigurationError::DuplicateVertex {
                    name: draft.name.clone(),
                });
            }
        }

        if self.start.is_empty() {
            return Err(ConfigurationError::NoStartVertices);
        }
        let mut start = Vec::with_capacity(self.start.len());
        for name in &self.start {
            let id = *index
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownStartVertex { name: name.clone() })?;
            if !start.contains(&id) {
                start.push(id);
            }
        }

        let mut vertices: Vec<Vertex<P>> = self
            .vertices
            .into_iter()
            .map(|draft| Vertex {
                name: draft.name,
                kind: draft.kind,
                transitions: Vec::new(),
            })
            .collect();

        let mut incoming_handling = vec![0usize; vertices.len()];
        let mut incoming_merging = vec![0usize; vertices.len()];

        for (from_name, transition) in self.transitions {
            let from = *index.get(&from_name).ok_or_else(|| {
                ConfigurationError::UnknownTransitionSource {
                    name: from_name.clone(),
                }
            })?;
            if !vertices[from].is_mergeable() {
                return Err(ConfigurationError::TransitionsWithoutMerger { name: from_name });
            }
            let kind = match &transition.target {
                TransitionTarget::Complete => ResolvedTarget::Complete,
                TransitionTarget::HandleBy(target_name) => {
                    let target = *index.get(target_name).ok_or_else(|| {
                        ConfigurationError::UnknownTransitionTarget {
                            from: from_name.clone(),
                            target: target_name.clone(),
                        }
                    })?;
                    if !vertices[target].has_handling_phase() {
                        return Err(ConfigurationError::HandleTargetDetached {
                            from: from_name.clone(),
                            target: target_name.clone(),
                        });
                    }
                    incoming_handling[target] += 1;
                    ResolvedTarget::HandleBy(target)
                }
                TransitionTarget::MergeBy(target_name) => {
                    let target = *index.get(target_name).ok_or_else(|| {
                        ConfigurationError::UnknownTransitionTarget {
                            from: from_name.clone(),
                            target: target_name.clone(),
                        }
                    })?;
                    if !vertices[target].is_mergeable() {
                        return Err(ConfigurationError::MergeTargetNotMergeable {
                            from: from_name.clone(),
                            target: target_name.clone(),
                        });
                    }
                    incoming_merging[target] += 1;
                    ResolvedTarget::MergeBy(target)
                }
            };
            vertices[from].transitions.push(ResolvedTransition {
                condition: transition.condition,
                kind,
            });
        }

        // Every vertex must be reachable through its own flow kind or be a
        // declared entry point.
        for (id, vertex) in vertices.iter().enumerate() {
            if start.contains(&id) {
                continue;
            }
            if vertex.has_handling_phase() && incoming_handling[id] == 0 {
                return Err(ConfigurationError::NoIncomingHandling {
                    name: vertex.name.clone(),
                });
            }
            if vertex.is_detached() && incoming_merging[id] == 0 {
                return Err(ConfigurationError::NoIncomingMerging {
                    name: vertex.name.clone(),
                });
            }
        }

        tracing::debug!(
            vertices = vertices.len(),
            start = ?start,
            "graph built"
        );

        Ok(Graph {
            vertices,
            index,
            start,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::graph::MergeStatus;
    use crate::handler::HandlerError;

    struct Nop;

    #[async_trait]
    impl Handler<u32> for Nop {
        async fn handle(&self, _payload: Arc<u32>) -> Result<Value, HandlerError> {
            Ok(Value::Null)
        }
    }

    struct AlwaysOk;

    impl Merger<u32> for AlwaysOk {
        fn merge(&self, _payload: &mut u32, _result: &Value) -> Result<MergeStatus, HandlerError> {
            Ok("ok".into())
        }
    }

    impl DetachedMerger<u32> for AlwaysOk {
        fn merge(&self, _payload: &mut u32) -> Result<MergeStatus, HandlerError> {
            Ok("ok".into())
        }
    }

    #[test]
    fn builds_minimal_graph() {
        let graph = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .start_at("a")
            .transition("a", Transition::on_any().complete())
            .build()
            .unwrap();
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.vertex_id("a"), Some(0));
        assert_eq!(graph.start_vertices().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn rejects_duplicate_vertex() {
        let err = GraphBuilder::<u32>::new()
            .add_handler("a", Nop)
            .add_handler("a", Nop)
            .start_at("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateVertex { name } if name == "a"));
    }

    #[test]
    fn rejects_missing_start() {
        let err = GraphBuilder::<u32>::new()
            .add_handler("a", Nop)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoStartVertices));

        let err = GraphBuilder::<u32>::new()
            .add_handler("a", Nop)
            .start_at("missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownStartVertex { name } if name == "missing"));
    }

    #[test]
    fn rejects_unknown_transition_endpoints() {
        let err = GraphBuilder::<u32>::new()
            .add_handler("a", Nop)
            .start_at("a")
            .transition("ghost", Transition::on_any().complete())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownTransitionSource { name } if name == "ghost"));

        let err = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .start_at("a")
            .transition("a", Transition::on_any().handle_by("ghost"))
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::UnknownTransitionTarget { target, .. } if target == "ghost")
        );
    }

    #[test]
    fn rejects_unreachable_vertices() {
        let err = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .add_handler("orphan", Nop)
            .start_at("a")
            .transition("a", Transition::on_any().complete())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoIncomingHandling { name } if name == "orphan"));

        let err = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .add_merge_point("island", AlwaysOk)
            .start_at("a")
            .transition("a", Transition::on_any().complete())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoIncomingMerging { name } if name == "island"));
    }

    #[test]
    fn rejects_mismatched_target_kinds() {
        // handle_by cannot target a detached merge point
        let err = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .add_merge_point("m", AlwaysOk)
            .start_at("a")
            .transition("a", Transition::on_any().handle_by("m"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::HandleTargetDetached { target, .. } if target == "m"));

        // merge_by cannot target a merger-less handler
        let err = GraphBuilder::<u32>::new()
            .add_handler_with_merger("a", Nop, AlwaysOk)
            .add_handler("plain", Nop)
            .start_at("a")
            .transition("a", Transition::on_any().handle_by("plain"))
            .transition("a", Transition::on_any().merge_by("plain"))
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::MergeTargetNotMergeable { target, .. } if target == "plain")
        );
    }

    #[test]
    fn rejects_transitions_from_merger_less_vertex() {
        let err = GraphBuilder::<u32>::new()
            .add_handler("a", Nop)
            .start_at("a")
            .transition("a", Transition::on_any().complete())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::TransitionsWithoutMerger { name } if name == "a"));
    }

    #[test]
    fn condition_matching() {
        use crate::graph::TransitionCondition;

        let any = TransitionCondition::OnAny;
        assert!(any.matches(&"whatever".into()));

        let set = TransitionCondition::OnStatus(vec!["a".into(), "b".into()]);
        assert!(set.matches(&"a".into()));
        assert!(set.matches(&"b".into()));
        assert!(!set.matches(&"c".into()));
        assert_eq!(set.to_string(), "on(a|b)");
    }
}
