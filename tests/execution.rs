//! End-to-end execution tests: linear flows, merge-flow chaining, branch
//! selection, sub-graphs, and failure propagation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use reactograph::errors::ExecutionError;
use reactograph::execution::SlotState;
use reactograph::graph::{GraphBuilder, Transition};
use reactograph::handler::{HandlerError, SubgraphRunner};
use reactograph::reactor::{Reactor, ReactorConfig};

use common::*;

#[tokio::test]
async fn single_handler_reaches_terminal() {
    let handler = IdHandler::new(1);
    let invocations = handler.counter();

    let graph = GraphBuilder::new()
        .add_handler_with_merger("collect", handler, PushIdMerger::new("ok"))
        .start_at("collect")
        .transition("collect", Transition::on_any().complete())
        .build()
        .unwrap();

    let reactor = Reactor::new(graph);
    let result = reactor.execute(IdList::new()).await.unwrap();

    assert_eq!(result.ids, vec![1]);
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequential_merge_preserves_declared_order() {
    // Both handlers start concurrently; "first" finishes last, but the merge
    // chain (first -> second) still applies the mergers in declaration order.
    let first = IdHandler::delayed(1, Duration::from_millis(30));
    let second = IdHandler::new(2);

    let graph = GraphBuilder::new()
        .add_handler_with_merger("first", first, PushIdMerger::new("ok"))
        .add_handler_with_merger("second", second, PushIdMerger::new("done"))
        .start_at("first")
        .start_at("second")
        .transition("first", Transition::on(["ok"]).merge_by("second"))
        .transition("second", Transition::on_any().complete())
        .build()
        .unwrap();

    let result = Reactor::new(graph).execute(IdList::new()).await.unwrap();
    assert_eq!(result.ids, vec![1, 2]);
}

#[tokio::test]
async fn matching_branch_runs_and_sibling_stays_cold() {
    // H merges with status "a": the terminal transition fires and K must
    // never be invoked.
    let h = IdHandler::new(10);
    let k = IdHandler::new(20);
    let k_invocations = k.counter();

    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", h, PushIdMerger::new("a"))
        .add_handler_with_merger("k", k, PushIdMerger::new("ok"))
        .start_at("h")
        .transition("h", Transition::on(["a"]).complete())
        .transition("h", Transition::on(["b"]).handle_by("k"))
        .transition("k", Transition::on_any().complete())
        .build()
        .unwrap();

    let reactor = Reactor::new(graph);
    let handle = reactor.submit(IdList::new());
    let result = handle.result().await.unwrap();
    handle.drained().await;

    assert_eq!(result.ids, vec![10]);
    assert_eq!(k_invocations.load(std::sync::atomic::Ordering::SeqCst), 0);
}

struct SummingRunner;

#[async_trait]
impl SubgraphRunner for SummingRunner {
    async fn run(&self, sub_payload: Value) -> Result<Value, HandlerError> {
        let sum: i64 = sub_payload
            .as_array()
            .ok_or_else(|| HandlerError::msg("expected an array sub-payload"))?
            .iter()
            .filter_map(Value::as_i64)
            .sum();
        Ok(json!(sum))
    }
}

#[tokio::test]
async fn subgraph_projection_feeds_the_runner() {
    let graph = GraphBuilder::new()
        .add_handler_with_merger("seed", IdHandler::new(4), PushIdMerger::new("ok"))
        .add_subgraph_with_merger("sum", IdsProjection, PushIdMerger::new("done"))
        .start_at("seed")
        .transition("seed", Transition::on(["ok"]).handle_by("sum"))
        .transition("sum", Transition::on_any().complete())
        .build()
        .unwrap();

    let reactor = Reactor::new(graph).with_subgraph_runner(SummingRunner);
    let result = reactor.execute(IdList::seeded(3)).await.unwrap();

    // seed pushes 4, the sub-graph sums [3, 4] and its merger pushes 7.
    assert_eq!(result.ids, vec![3, 4, 7]);
}

#[tokio::test]
async fn subgraph_without_runner_fails_the_execution() {
    let graph = GraphBuilder::new()
        .add_subgraph_with_merger("sub", IdsProjection, PushIdMerger::new("ok"))
        .start_at("sub")
        .transition("sub", Transition::on_any().complete())
        .build()
        .unwrap();

    let err = Reactor::new(graph).execute(IdList::new()).await.unwrap_err();
    match err {
        ExecutionError::Invocation { vertex, detail } => {
            assert_eq!(vertex, "sub");
            assert!(detail.contains("runner"), "detail was: {detail}");
        }
        other => panic!("expected Invocation, got: {other:?}"),
    }
}

#[tokio::test]
async fn handler_failure_fails_the_execution_and_drains() {
    let graph = GraphBuilder::new()
        .add_handler("bad", FailingHandler)
        .start_at("bad")
        .build()
        .unwrap();

    let reactor = Reactor::new(graph);
    let handle = reactor.submit(IdList::new());
    let err = handle.result().await.unwrap_err();
    assert!(matches!(err, ExecutionError::Invocation { ref vertex, .. } if vertex == "bad"));

    // The graph settles fully even though the execution failed.
    handle.drained().await;
}

#[tokio::test]
async fn handler_panic_is_contained() {
    let graph = GraphBuilder::new()
        .add_handler("explosive", PanickingHandler)
        .start_at("explosive")
        .build()
        .unwrap();

    let err = Reactor::new(graph).execute(IdList::new()).await.unwrap_err();
    match err {
        ExecutionError::Invocation { vertex, detail } => {
            assert_eq!(vertex, "explosive");
            assert!(detail.contains("panic"), "detail was: {detail}");
        }
        other => panic!("expected Invocation, got: {other:?}"),
    }
}

#[tokio::test]
async fn merger_failure_fails_the_execution() {
    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", IdHandler::new(1), FailingMerger)
        .start_at("h")
        .transition("h", Transition::on_any().complete())
        .build()
        .unwrap();

    let err = Reactor::new(graph).execute(IdList::new()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Invocation { ref vertex, .. } if vertex == "h"));
}

#[tokio::test]
async fn second_submission_is_rejected() {
    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", IdHandler::new(1), PushIdMerger::new("ok"))
        .start_at("h")
        .transition("h", Transition::on_any().complete())
        .build()
        .unwrap();

    let handle = Reactor::new(graph).start_execution();
    assert!(handle.submit(IdList::new()));
    assert!(!handle.submit(IdList::seeded(99)));

    let result = handle.result().await.unwrap();
    assert_eq!(result.ids, vec![1]);
}

#[tokio::test]
async fn debug_probes_expose_settled_states() {
    // h routes to the merge point, so the k branch settles dead (not
    // terminal) and every probe value is deterministic after the drain.
    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", IdHandler::new(10), PushIdMerger::new("stop"))
        .add_handler_with_merger("k", IdHandler::new(20), PushIdMerger::new("ok"))
        .add_merge_point("finish", AppendMergePoint { id: 99, status: "ok" })
        .start_at("h")
        .transition("h", Transition::on(["stop"]).merge_by("finish"))
        .transition("h", Transition::on(["go"]).handle_by("k"))
        .transition("k", Transition::on_any().complete())
        .transition("finish", Transition::on_any().complete())
        .build()
        .unwrap();

    let reactor = Reactor::new(graph).with_config(ReactorConfig {
        debug_execution_state: true,
        ..ReactorConfig::default()
    });

    let handle = reactor.submit(IdList::new());
    handle.result().await.unwrap();
    handle.drained().await;

    // Merging slots of dead branches settle asynchronously shortly after the
    // drain; poll until every slot has left Pending.
    let read = |name: &str| {
        let states = handle.vertex_states().expect("probes enabled");
        states.iter().find(|s| s.vertex == name).unwrap().clone()
    };
    for _ in 0..200 {
        if read("k").merging != SlotState::Pending {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let h = read("h");
    assert_eq!(h.handling, Some(SlotState::Active));
    assert_eq!(h.merging, SlotState::Active);

    let k = read("k");
    assert_eq!(k.handling, Some(SlotState::Dead));
    assert_eq!(k.merging, SlotState::Dead);

    let finish = read("finish");
    assert_eq!(finish.handling, None);
    assert_eq!(finish.merging, SlotState::Terminal);
}

#[tokio::test]
async fn probes_are_absent_by_default() {
    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", IdHandler::new(1), PushIdMerger::new("ok"))
        .start_at("h")
        .transition("h", Transition::on_any().complete())
        .build()
        .unwrap();

    let handle = Reactor::new(graph).submit(IdList::new());
    handle.result().await.unwrap();
    assert!(handle.vertex_states().is_none());
}

#[tokio::test]
async fn result_is_shared_not_recomputed() {
    let graph = GraphBuilder::new()
        .add_handler_with_merger("h", IdHandler::new(5), PushIdMerger::new("ok"))
        .start_at("h")
        .transition("h", Transition::on_any().complete())
        .build()
        .unwrap();

    let handle = Reactor::new(graph).submit(IdList::new());
    let first = handle.result().await.unwrap();
    let second = handle.result().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
