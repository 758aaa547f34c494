//! Immutable graph model shared by all executions.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::handler::{DetachedMerger, Handler, Merger, Router, SubgraphProjection};

/// Index of a vertex inside its [`Graph`].
pub type VertexId = usize;

/// Enumerated outcome of a merger or router, used to select the active
/// outgoing transition of a vertex.
///
/// Statuses are plain strings so one graph's vocabulary never collides with
/// the engine. Use [`From`] to build them from literals:
///
/// ```rust
/// use reactograph::graph::MergeStatus;
///
/// let ok = MergeStatus::from("ok");
/// assert_eq!(ok.as_str(), "ok");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeStatus(String);

impl MergeStatus {
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MergeStatus {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MergeStatus {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Condition deciding whether a transition activates for a given merge status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionCondition {
    /// Activates for any merge status.
    OnAny,
    /// Activates only for one of the listed statuses. Order preserves the
    /// declaration order; matching ignores it.
    OnStatus(Vec<MergeStatus>),
}

impl TransitionCondition {
    #[must_use]
    pub fn matches(&self, status: &MergeStatus) -> bool {
        match self {
            Self::OnAny => true,
            Self::OnStatus(statuses) => statuses.contains(status),
        }
    }
}

impl fmt::Display for TransitionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnAny => write!(f, "onAny"),
            Self::OnStatus(statuses) => {
                write!(f, "on(")?;
                for (i, s) in statuses.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Authoring-time transition target, by vertex name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionTarget {
    /// Terminal transition: completes the execution with the current payload.
    Complete,
    /// Payload flows to the target vertex's handling phase.
    HandleBy(String),
    /// Payload and status flow to the target vertex's merging phase.
    MergeBy(String),
}

/// A conditional edge declared on a mergeable vertex.
///
/// Built fluently, mirroring how a graph reads on paper:
///
/// ```rust
/// use reactograph::graph::Transition;
///
/// let a = Transition::on(["ok"]).handle_by("next");
/// let b = Transition::on(["retry", "backoff"]).merge_by("collector");
/// let c = Transition::on_any().complete();
/// ```
#[derive(Clone, Debug)]
pub struct Transition {
    pub(crate) condition: TransitionCondition,
    pub(crate) target: TransitionTarget,
}

impl Transition {
    /// Start a transition matching one of the given statuses.
    pub fn on<S, I>(statuses: I) -> TransitionBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<MergeStatus>,
    {
        TransitionBuilder {
            condition: TransitionCondition::OnStatus(
                statuses.into_iter().map(Into::into).collect(),
            ),
        }
    }

    /// Start a transition matching any status.
    #[must_use]
    pub fn on_any() -> TransitionBuilder {
        TransitionBuilder {
            condition: TransitionCondition::OnAny,
        }
    }
}

/// Intermediate state of the [`Transition`] fluent constructor.
#[derive(Clone, Debug)]
pub struct TransitionBuilder {
    condition: TransitionCondition,
}

impl TransitionBuilder {
    /// Target the handling phase of `target`.
    #[must_use]
    pub fn handle_by(self, target: impl Into<String>) -> Transition {
        Transition {
            condition: self.condition,
            target: TransitionTarget::HandleBy(target.into()),
        }
    }

    /// Target the merging phase of `target`.
    #[must_use]
    pub fn merge_by(self, target: impl Into<String>) -> Transition {
        Transition {
            condition: self.condition,
            target: TransitionTarget::MergeBy(target.into()),
        }
    }

    /// End the execution when this transition activates.
    #[must_use]
    pub fn complete(self) -> Transition {
        Transition {
            condition: self.condition,
            target: TransitionTarget::Complete,
        }
    }
}

/// Transition with its target resolved to a vertex index.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedTransition {
    pub(crate) condition: TransitionCondition,
    pub(crate) kind: ResolvedTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResolvedTarget {
    Complete,
    HandleBy(VertexId),
    MergeBy(VertexId),
}

impl ResolvedTransition {
    pub(crate) fn is_complete(&self) -> bool {
        matches!(self.kind, ResolvedTarget::Complete)
    }
}

/// What a vertex does when its single active incoming flow arrives.
pub(crate) enum VertexKind<P> {
    Handler {
        handler: Arc<dyn Handler<P>>,
        merger: Option<Arc<dyn Merger<P>>>,
    },
    Subgraph {
        projection: Arc<dyn SubgraphProjection<P>>,
        merger: Option<Arc<dyn Merger<P>>>,
    },
    MergePoint {
        merger: Arc<dyn DetachedMerger<P>>,
    },
    Router {
        router: Arc<dyn Router<P>>,
    },
}

/// A node of the immutable graph model.
pub(crate) struct Vertex<P> {
    pub(crate) name: String,
    pub(crate) kind: VertexKind<P>,
    pub(crate) transitions: Vec<ResolvedTransition>,
}

impl<P> Vertex<P> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Handler and sub-graph vertices run a handling phase; detached merge
    /// points and routers are fed by merging flows only.
    pub(crate) fn has_handling_phase(&self) -> bool {
        matches!(
            self.kind,
            VertexKind::Handler { .. } | VertexKind::Subgraph { .. }
        )
    }

    pub(crate) fn is_detached(&self) -> bool {
        matches!(
            self.kind,
            VertexKind::MergePoint { .. } | VertexKind::Router { .. }
        )
    }

    /// Mergeable vertices resolve a merge status and own outgoing transitions.
    pub(crate) fn is_mergeable(&self) -> bool {
        match &self.kind {
            VertexKind::Handler { merger, .. } | VertexKind::Subgraph { merger, .. } => {
                merger.is_some()
            }
            VertexKind::MergePoint { .. } | VertexKind::Router { .. } => true,
        }
    }
}

/// Immutable adjacency structure consumed by the execution engine.
///
/// Constructed by [`GraphBuilder::build`](crate::graph::GraphBuilder::build);
/// safely shared read-only across concurrently running executions via
/// [`Reactor`](crate::reactor::Reactor).
pub struct Graph<P> {
    pub(crate) vertices: Vec<Vertex<P>>,
    pub(crate) index: FxHashMap<String, VertexId>,
    pub(crate) start: Vec<VertexId>,
}

impl<P> Graph<P> {
    /// Number of vertices in the graph.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Look up a vertex index by name.
    #[must_use]
    pub fn vertex_id(&self, name: &str) -> Option<VertexId> {
        self.index.get(name).copied()
    }

    /// Names of the start vertices, in declaration order.
    pub fn start_vertices(&self) -> impl Iterator<Item = &str> {
        self.start.iter().map(|&id| self.vertices[id].name())
    }

    pub(crate) fn vertex(&self, id: VertexId) -> &Vertex<P> {
        &self.vertices[id]
    }
}

impl<P> fmt::Debug for Graph<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.index.len())
            .field("start", &self.start)
            .finish()
    }
}
