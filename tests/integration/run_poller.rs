//! Run status poller timing and lifecycle.

use super::test_utils::*;
use collab_console::backend::RunRef;
use collab_console::context::ResolvedContext;
use collab_console::error::BackendError;
use collab_console::poller::{PollOutcome, RunStatusPoller};
use collab_console::types::RunStatus;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(2);

fn context_with_run(run_id: i64, status: RunStatus) -> ResolvedContext {
    ResolvedContext {
        project: Some(project("p1")),
        model: Some(model("m1")),
        pipeline: Some(pipeline(5)),
        run: Some(run(run_id, status)),
    }
}

fn run_ref(run_id: i64) -> RunRef {
    RunRef {
        project_slug: "p1".to_string(),
        model_slug: "m1".to_string(),
        pipeline_id: 5,
        run_id,
    }
}

#[tokio::test(start_paused = true)]
async fn test_four_statuses_give_four_snapshots_and_no_fifth_fetch() {
    let backend = FakeBackend::new()
        .with_run_statuses(
            "p1",
            "m1",
            5,
            9,
            &[
                RunStatus::Pending,
                RunStatus::Pending,
                RunStatus::Running,
                RunStatus::Success,
            ],
        )
        .into_arc();
    let (_context_tx, context) = watch::channel(context_with_run(9, RunStatus::Pending));

    let poller = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL);
    let updates = poller.subscribe();
    let outcome = poller.run(context).await;

    assert_eq!(outcome, PollOutcome::Finished(run(9, RunStatus::Success)));
    let last = updates.borrow().clone().unwrap();
    assert_eq!(last.observed, 4);
    assert_eq!(last.run.status, RunStatus::Success);

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(backend.count(&run_key("p1", "m1", 5, 9)), 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetches_never_overlap() {
    let latency = Duration::from_secs(5);
    let backend = FakeBackend::new()
        .with_run_statuses(
            "p1",
            "m1",
            5,
            9,
            &[
                RunStatus::Running,
                RunStatus::Running,
                RunStatus::Running,
                RunStatus::Failure,
            ],
        )
        .with_latency(latency)
        .into_arc();
    let (_context_tx, context) = watch::channel(context_with_run(9, RunStatus::Running));

    let started = Instant::now();
    let outcome = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL)
        .run(context)
        .await;

    assert!(matches!(outcome, PollOutcome::Finished(ref r) if r.status == RunStatus::Failure));
    assert_eq!(backend.max_in_flight(), 1);
    // Each tick starts an interval after the previous fetch returned.
    assert!(started.elapsed() >= latency * 4 + INTERVAL * 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_is_retried_next_interval() {
    let backend = FakeBackend::new()
        .with_run_script(
            "p1",
            "m1",
            5,
            9,
            vec![
                Err(BackendError::Transport("connection reset".to_string())),
                Ok(run(9, RunStatus::Running)),
                Ok(run(9, RunStatus::Success)),
            ],
        )
        .into_arc();
    let (_context_tx, context) = watch::channel(context_with_run(9, RunStatus::Running));

    let poller = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL);
    let updates = poller.subscribe();
    let outcome = poller.run(context).await;

    assert!(matches!(outcome, PollOutcome::Finished(_)));
    assert_eq!(updates.borrow().as_ref().unwrap().observed, 2);
    assert_eq!(backend.count(&run_key("p1", "m1", 5, 9)), 3);
}

#[tokio::test]
async fn test_detach_discards_in_flight_result() {
    let backend = FakeBackend::new()
        .with_run_statuses("p1", "m1", 5, 9, &[RunStatus::Success])
        .into_arc();
    let key = run_key("p1", "m1", 5, 9);
    backend.gate(&key);
    let (context_tx, context) = watch::channel(context_with_run(9, RunStatus::Running));

    let handle = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL).spawn(context);
    backend.wait_for_calls(1).await;

    let mut without_run = context_with_run(9, RunStatus::Running);
    without_run.run = None;
    context_tx.send_replace(without_run);

    let updates = handle.updates();
    assert_eq!(handle.join().await.unwrap(), PollOutcome::Detached);

    backend.release(&key);
    tokio::time::timeout(Duration::from_secs(5), async {
        while !backend.completed().contains(&key) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    settle().await;

    assert!(updates.borrow().is_none());
    assert_eq!(backend.count(&key), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switching_runs_detaches_poller() {
    let backend = FakeBackend::new()
        .with_run_statuses("p1", "m1", 5, 9, &[RunStatus::Running])
        .into_arc();
    let (context_tx, context) = watch::channel(context_with_run(9, RunStatus::Running));

    let handle = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL).spawn(context);
    tokio::time::sleep(INTERVAL * 3).await;
    assert!(!handle.is_finished());

    context_tx.send_replace(context_with_run(10, RunStatus::Running));
    assert_eq!(handle.join().await.unwrap(), PollOutcome::Detached);

    let fetched = backend.count(&run_key("p1", "m1", 5, 9));
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(backend.count(&run_key("p1", "m1", 5, 9)), fetched);
}

#[tokio::test(start_paused = true)]
async fn test_poller_stops_when_context_is_dropped() {
    let backend = FakeBackend::new()
        .with_run_statuses("p1", "m1", 5, 9, &[RunStatus::Running])
        .into_arc();
    let (context_tx, context) = watch::channel(context_with_run(9, RunStatus::Running));
    let handle = RunStatusPoller::new(backend.clone(), run_ref(9), INTERVAL).spawn(context);

    tokio::time::sleep(INTERVAL).await;
    drop(context_tx);
    assert_eq!(handle.join().await.unwrap(), PollOutcome::Detached);
}
