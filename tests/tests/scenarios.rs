mod utils;
#[allow(unused)]
use utils::*;

use kvbench::prelude::*;
use kvbench::{BenchError, StoreError};
use kvbench_core::{OperationKind, Phase, Progress};
use mock_store::{Behavior, MockConnector};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

#[tokio::test]
#[ntest::timeout(10_000)]
async fn single_set_session() {
    init();
    let connector = MockConnector::default();
    let (outcome, events) = run_session(
        config(json!({"testDuration": 1, "testTypes": ["set"]})),
        connector.clone(),
    )
    .await;

    let results = match outcome.unwrap() {
        SessionOutcome::Completed(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(names(&events), vec!["started", "result", "completed"]);

    let set = results.detail(OperationKind::Set).unwrap();
    assert_eq!(set.iterations, 1000);
    assert_eq!(set.successes, 1000);
    assert_eq!(results.summary.total_operations, 1000);
    assert_eq!(results.summary.success_rate, 100.);
    assert!(results.errors.is_empty());

    let phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            BenchEvent::Progress(Progress::Phase(p)) => Some(p.phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![Phase::Connected, Phase::Starting, Phase::Testing, Phase::Cleanup]
    );

    let state = connector.state();
    let state = state.lock().unwrap();
    assert_eq!(state.key_count(), 0, "test keys should be cleaned up");
    assert_eq!(state.connections, 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn all_operation_types_in_order() {
    init();
    let (outcome, events) = run_session(
        config(json!({"testDuration": 1})),
        MockConnector::default(),
    )
    .await;

    let results = match outcome.unwrap() {
        SessionOutcome::Completed(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    };

    let order: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BenchEvent::Result(r) => Some(r.operation),
            _ => None,
        })
        .collect();
    assert_eq!(order, OperationKind::ALL.to_vec());

    for detail in &results.details {
        assert_eq!(detail.iterations, 250);
        assert_eq!(detail.successes, 250, "{} had failures", detail.operation);
        assert!(detail.min_time <= detail.p50);
        assert!(detail.p50 <= detail.p95);
        assert!(detail.p95 <= detail.p99);
        assert!(detail.p99 <= detail.max_time);
    }

    let json = serde_json::to_value(BenchEvent::Completed(results)).unwrap();
    assert_eq!(json["event"], "completed");
    assert_eq!(json["data"]["details"]["HGET"]["iterations"], 250);
    assert_eq!(json["data"]["summary"]["totalOperations"], 1000);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn per_operation_failures_are_counted() {
    init();
    let connector = MockConnector::new(Behavior {
        fail_every: Some(7),
        ..Default::default()
    });
    let (outcome, events) = run_session(
        config(json!({"testDuration": "1", "testTypes": ["set", "GET", "set"]})),
        connector,
    )
    .await;

    let results = match outcome.unwrap() {
        SessionOutcome::Completed(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(names(&events), vec!["started", "result", "result", "completed"]);

    for detail in &results.details {
        assert_eq!(detail.iterations, 500);
        assert_eq!(detail.successes + detail.failures, detail.iterations);
    }
    assert_eq!(results.summary.total_failures, 1000 / 7);
    assert_eq!(results.errors.len() as u64, results.summary.total_failures);
    assert_eq!(results.summary.error_count, results.errors.len());
    assert!(results.summary.success_rate < 100.);

    let first = &results.errors[0];
    assert_eq!(first.operation, OperationKind::Set);
    assert_eq!(first.error, "ERR injected failure");
    assert!(first.field.is_none());
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn connection_refused() {
    init();
    let connector = MockConnector::new(Behavior {
        refuse_connection: true,
        ..Default::default()
    });
    let (outcome, events) = run_session(config(json!({"port": 6390})), connector.clone()).await;

    assert!(matches!(
        outcome.unwrap(),
        SessionOutcome::Failed(BenchError::Connect(StoreError::Connect { .. }))
    ));
    assert_eq!(names(&events), vec!["error"]);
    match &events[0] {
        BenchEvent::Error(msg) => {
            assert!(msg.message.contains("localhost:6390"));
            assert!(msg.message.contains("Connection refused"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(connector.state().lock().unwrap().connections, 0);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn lost_connection_aborts_session() {
    init();
    let connector = MockConnector::new(Behavior {
        disconnect_after: Some(300),
        ..Default::default()
    });
    let (outcome, events) = run_session(
        config(json!({"testDuration": 1, "testTypes": ["set", "get"]})),
        connector.clone(),
    )
    .await;

    assert!(matches!(
        outcome.unwrap(),
        SessionOutcome::Failed(BenchError::Store(StoreError::Disconnected(_)))
    ));
    assert_eq!(names(&events), vec!["started", "error"]);
    assert_eq!(connector.state().lock().unwrap().closed, 1);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn stop_before_any_result() {
    init();
    let connector = MockConnector::default();
    let events = Arc::new(Mutex::new(vec![]));
    let stop = Arc::new(OnceLock::<StopHandle>::new());

    let sink = {
        let events = events.clone();
        let stop = stop.clone();
        kvbench::sink::from_fn(move |event: BenchEvent| {
            if let (BenchEvent::Started(_), Some(stop)) = (&event, stop.get()) {
                stop.stop();
            }
            events.lock().unwrap().push(event);
        })
    };

    let runner = BenchRunner::new(config(json!({"testDuration": 1})), connector.clone(), sink);
    stop.set(runner.stop_handle()).unwrap();

    let outcome = runner.run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Stopped));
    assert_eq!(names(&events.lock().unwrap()), vec!["started", "stopped"]);

    let state = connector.state();
    let state = state.lock().unwrap();
    assert_eq!(state.commands, 0);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn stop_after_first_operation_skips_cleanup() {
    init();
    let connector = MockConnector::default();
    let events = Arc::new(Mutex::new(vec![]));
    let stop = Arc::new(OnceLock::<StopHandle>::new());

    let sink = {
        let events = events.clone();
        let stop = stop.clone();
        kvbench::sink::from_fn(move |event: BenchEvent| {
            if let (BenchEvent::Result(_), Some(stop)) = (&event, stop.get()) {
                stop.stop();
            }
            events.lock().unwrap().push(event);
        })
    };

    let runner = BenchRunner::new(
        config(json!({"testDuration": 1, "testTypes": ["set", "get"]})),
        connector.clone(),
        sink,
    );
    stop.set(runner.stop_handle()).unwrap();

    let outcome = runner.run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Stopped));
    assert_eq!(
        names(&events.lock().unwrap()),
        vec!["started", "result", "stopped"]
    );
    assert_eq!(connector.state().lock().unwrap().key_count(), 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(20_000)]
async fn concurrent_sessions_are_isolated() {
    init();
    let connector = MockConnector::new(Behavior {
        latency: Duration::from_micros(200),
        ..Default::default()
    });

    let a = tokio::spawn(run_session(
        config(json!({"testDuration": 1, "testTypes": ["set", "get"]})),
        connector.clone(),
    ));
    let b = tokio::spawn(run_session(
        config(json!({"testDuration": 1, "testTypes": ["hset", "hget"]})),
        connector.clone(),
    ));

    for handle in [a, b] {
        let (outcome, events) = handle.await.unwrap();
        match outcome.unwrap() {
            SessionOutcome::Completed(results) => {
                assert_eq!(results.summary.total_operations, 1000);
                assert_eq!(results.summary.total_failures, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    let state = connector.state();
    let state = state.lock().unwrap();
    assert_eq!(state.connections, 2);
    assert_eq!(state.key_count(), 0);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn latency_is_reflected_in_statistics() {
    init();
    let connector = MockConnector::new(Behavior {
        latency: Duration::from_millis(2),
        ..Default::default()
    });
    let (outcome, _) = run_session(
        config(json!({"testDuration": 1, "testTypes": ["set"]})),
        connector,
    )
    .await;

    let results = match outcome.unwrap() {
        SessionOutcome::Completed(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    };
    let set = results.detail(OperationKind::Set).unwrap();
    assert!(set.min_time >= 2., "min {}", set.min_time);
    assert!(set.p50 >= 2.);
    assert!(set.avg_time >= 2.);
    assert!(set.total_time >= 2_000.);
    assert!(set.ops <= 500., "ops {}", set.ops);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn overloaded_store_rejects_some_operations() {
    init();
    let connector = MockConnector::new(Behavior {
        max_ops_per_sec: NonZeroU32::new(100),
        ..Default::default()
    });
    let (outcome, _) = run_session(
        config(json!({"testDuration": 1, "testTypes": ["set"]})),
        connector,
    )
    .await;

    let results = match outcome.unwrap() {
        SessionOutcome::Completed(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    };
    let set = results.detail(OperationKind::Set).unwrap();
    assert!(set.failures > 0);
    assert!(set.successes > 0);
    assert_eq!(set.successes + set.failures, 1000);
    assert!(results
        .errors
        .iter()
        .all(|e| e.error == "ERR max ops exceeded"));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn report_renders_completed_session() {
    init();
    let (outcome, _) = run_session(
        config(json!({"testDuration": 1, "testTypes": ["get"], "valueSize": 2048})),
        MockConnector::default(),
    )
    .await;

    let SessionOutcome::Completed(results) = outcome.unwrap() else {
        panic!("session did not complete");
    };
    let report = Report(&results).to_string();
    assert!(report.contains("### GET"));
    assert!(report.contains("2.00 KB"));
}
