#![allow(dead_code)]

//! Shared payloads, handlers, and mergers for the integration suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use reactograph::graph::MergeStatus;
use reactograph::handler::{
    DetachedMerger, Handler, HandlerError, Merger, Router, SubgraphProjection,
};

/// Collects the ids of every merger that touched it, so tests can assert
/// which vertices processed the payload and in what order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdList {
    pub ids: Vec<i64>,
}

impl IdList {
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    pub fn seeded(id: i64) -> Self {
        Self { ids: vec![id] }
    }
}

/// Handler producing its own id, optionally delayed, counting invocations.
pub struct IdHandler {
    pub id: i64,
    pub delay: Duration,
    pub invocations: Arc<AtomicUsize>,
}

impl IdHandler {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            delay: Duration::ZERO,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(id: i64, delay: Duration) -> Self {
        Self {
            id,
            delay,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.invocations.clone()
    }
}

#[async_trait]
impl Handler<IdList> for IdHandler {
    async fn handle(&self, _payload: Arc<IdList>) -> Result<Value, HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(json!(self.id))
    }
}

/// Handler that always fails.
pub struct FailingHandler;

#[async_trait]
impl Handler<IdList> for FailingHandler {
    async fn handle(&self, _payload: Arc<IdList>) -> Result<Value, HandlerError> {
        Err(HandlerError::msg("boom"))
    }
}

/// Handler that panics instead of returning.
pub struct PanickingHandler;

#[async_trait]
impl Handler<IdList> for PanickingHandler {
    async fn handle(&self, _payload: Arc<IdList>) -> Result<Value, HandlerError> {
        panic!("kaboom");
    }
}

/// Merger appending the handler result id and returning a fixed status.
pub struct PushIdMerger {
    pub status: &'static str,
}

impl PushIdMerger {
    pub fn new(status: &'static str) -> Self {
        Self { status }
    }
}

impl Merger<IdList> for PushIdMerger {
    fn merge(&self, payload: &mut IdList, result: &Value) -> Result<MergeStatus, HandlerError> {
        payload
            .ids
            .push(result.as_i64().ok_or_else(|| HandlerError::msg("non-integer result"))?);
        Ok(self.status.into())
    }
}

/// Merger that always fails.
pub struct FailingMerger;

impl Merger<IdList> for FailingMerger {
    fn merge(&self, _payload: &mut IdList, _result: &Value) -> Result<MergeStatus, HandlerError> {
        Err(HandlerError::msg("merge blew up"))
    }
}

/// Detached merge point appending a marker id.
pub struct AppendMergePoint {
    pub id: i64,
    pub status: &'static str,
}

impl DetachedMerger<IdList> for AppendMergePoint {
    fn merge(&self, payload: &mut IdList) -> Result<MergeStatus, HandlerError> {
        payload.ids.push(self.id);
        Ok(self.status.into())
    }
}

/// Routes by how many ids the payload has accumulated.
pub struct SizeRouter {
    pub threshold: usize,
}

impl Router<IdList> for SizeRouter {
    fn route(&self, payload: &IdList) -> Result<MergeStatus, HandlerError> {
        Ok(if payload.ids.len() >= self.threshold {
            "big".into()
        } else {
            "small".into()
        })
    }
}

/// Projection exposing the accumulated ids as the sub-payload.
pub struct IdsProjection;

impl SubgraphProjection<IdList> for IdsProjection {
    fn project(&self, payload: &IdList) -> Result<Value, HandlerError> {
        Ok(json!(payload.ids))
    }
}

/// Opt-in log output for debugging test runs:
/// `RUST_LOG=reactograph=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
