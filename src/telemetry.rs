//! Profiler and tracer hook interfaces.
//!
//! The engine fires these hooks around handler and merger invocations, keyed
//! by vertex name. Hooks are fire-and-forget collaborators: their failures -
//! including panics - are swallowed and never affect the execution outcome.

use serde::Serialize;
use uuid::Uuid;

/// Profiled call name prefix for handling invocations; the vertex name is
/// appended.
pub const HANDLE_CALL_PREFIX: &str = "reactograph.handle.";

/// Profiled call name prefix for merge invocations; the vertex name is
/// appended.
pub const MERGE_CALL_PREFIX: &str = "reactograph.merge.";

/// An in-flight profiled call, stopped when the measured section ends.
pub trait ProfiledSpan: Send {
    fn stop(self: Box<Self>);
}

/// Profiling backend interface.
///
/// [`begin`](Self::begin) is called right before a handler or merger runs with
/// a name of the form `reactograph.handle.<vertex>` or
/// `reactograph.merge.<vertex>`; the returned span is stopped when the
/// invocation settles.
pub trait Profiler: Send + Sync {
    fn begin(&self, name: &str) -> Box<dyn ProfiledSpan>;
}

/// Opaque marker correlating a `before_*` hook with its `after_*` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceMark(Uuid);

impl TraceMark {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TraceMark {
    fn default() -> Self {
        Self::new()
    }
}

/// Distributed-tracing backend interface.
///
/// Returning `None` from a `before_*` hook skips the paired `after_*` call,
/// letting implementations sample per vertex.
pub trait Tracer: Send + Sync {
    fn before_handle(&self, _vertex: &str) -> Option<TraceMark> {
        None
    }
    fn after_handle(&self, _mark: TraceMark, _vertex: &str, _failed: bool) {}
    fn before_merge(&self, _vertex: &str) -> Option<TraceMark> {
        None
    }
    fn after_merge(&self, _mark: TraceMark, _vertex: &str) {}
}

/// Profiler that measures nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProfiler;

struct NoopSpan;

impl ProfiledSpan for NoopSpan {
    fn stop(self: Box<Self>) {}
}

impl Profiler for NoopProfiler {
    fn begin(&self, _name: &str) -> Box<dyn ProfiledSpan> {
        Box::new(NoopSpan)
    }
}

/// Tracer that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Run a telemetry hook, swallowing panics so a faulty backend cannot take an
/// execution down with it.
pub(crate) fn shielded<T>(hook: &str, f: impl FnOnce() -> T) -> Option<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(hook, "telemetry hook panicked; ignoring");
            None
        }
    }
}

/// Render a payload for diagnostics. Failures of the dump itself are
/// swallowed.
pub fn dump_payload<P: Serialize>(payload: &P) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "<payload not serializable>".to_string())
}
