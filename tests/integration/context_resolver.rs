//! Context resolver against a scripted backend.

use super::test_utils::*;
use collab_console::context::{resolve_frame, ContextResolver, Level, LevelPhase, ResolvedContext};
use collab_console::error::BackendError;
use collab_console::types::{ParameterFrame, RunStatus};
use futures::channel::mpsc;
use futures::stream;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

async fn next_context(context: &mut watch::Receiver<ResolvedContext>) -> ResolvedContext {
    timeout(Duration::from_secs(5), context.changed())
        .await
        .expect("timed out waiting for a context change")
        .expect("resolver stopped");
    let snapshot = context.borrow_and_update().clone();
    snapshot
}

fn slugs(context: &ResolvedContext) -> (Option<&str>, Option<&str>) {
    (
        context.project.as_ref().map(|p| p.slug.as_str()),
        context.model.as_ref().map(|m| m.slug.as_str()),
    )
}

#[tokio::test]
async fn test_project_change_clears_context_before_new_fetch_completes() {
    let backend = FakeBackend::new()
        .with_project("p1")
        .with_model("p1", "m1")
        .with_project("p2")
        .into_arc();
    backend.gate(&project_key("p2"));

    let (frames, rx) = mpsc::unbounded();
    let resolver = ContextResolver::new(backend.clone()).spawn(rx);
    let mut context = resolver.context();

    frames.unbounded_send(ParameterFrame::project("p1")).unwrap();
    assert_eq!(slugs(&next_context(&mut context).await), (Some("p1"), None));

    frames
        .unbounded_send(ParameterFrame::project("p1").with_model("m1"))
        .unwrap();
    assert_eq!(slugs(&next_context(&mut context).await), (Some("p1"), Some("m1")));

    frames.unbounded_send(ParameterFrame::project("p2")).unwrap();
    let cleared = next_context(&mut context).await;
    assert!(cleared.is_empty());
    backend.wait_for_calls(3).await;
    assert_eq!(backend.count(&project_key("p2")), 1);
    assert!(!backend.completed().contains(&project_key("p2")));

    backend.release(&project_key("p2"));
    assert_eq!(slugs(&next_context(&mut context).await), (Some("p2"), None));

    // The project was fetched once; the model only after it.
    assert_eq!(
        backend.calls(),
        vec![project_key("p1"), model_key("p1", "m1"), project_key("p2")]
    );
    resolver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_superseded_frame_never_writes() {
    let backend = FakeBackend::new()
        .with_project("p1")
        .with_project("p2")
        .into_arc();
    backend.gate(&project_key("p1"));

    let (frames, rx) = mpsc::unbounded();
    let resolver = ContextResolver::new(backend.clone()).spawn(rx);
    let mut context = resolver.context();

    frames.unbounded_send(ParameterFrame::project("p1")).unwrap();
    backend.wait_for_calls(1).await;
    frames.unbounded_send(ParameterFrame::project("p2")).unwrap();
    assert_eq!(slugs(&next_context(&mut context).await), (Some("p2"), None));

    backend.release(&project_key("p1"));
    timeout(Duration::from_secs(5), async {
        while !backend.completed().contains(&project_key("p1")) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    settle().await;

    assert!(!context.has_changed().unwrap());
    assert_eq!(slugs(&context.borrow()), (Some("p2"), None));
    resolver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_model_reads_as_absent_and_repeated_frame_retries() {
    let backend = FakeBackend::new().with_project("p1").into_arc();

    let (frames, rx) = mpsc::unbounded();
    let resolver = ContextResolver::new(backend.clone()).spawn(rx);
    let mut context = resolver.context();

    let frame = ParameterFrame::project("p1").with_model("gone");
    frames.unbounded_send(frame.clone()).unwrap();
    assert_eq!(slugs(&next_context(&mut context).await), (Some("p1"), None));
    backend.wait_for_calls(2).await;
    settle().await;
    assert_eq!(backend.count(&model_key("p1", "gone")), 1);

    frames.unbounded_send(frame).unwrap();
    backend.wait_for_calls(3).await;
    settle().await;
    assert_eq!(backend.count(&model_key("p1", "gone")), 2);
    assert_eq!(backend.count(&project_key("p1")), 1);
    assert_eq!(slugs(&context.borrow()), (Some("p1"), None));
    resolver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_transient_failure_recovers_on_repeated_frame() {
    let backend = FakeBackend::new()
        .with_project("p1")
        .with_model("p1", "m1")
        .with_pipeline("p1", "m1", 5)
        .with_run_script(
            "p1",
            "m1",
            5,
            9,
            vec![
                Err(BackendError::Transport("connection reset".to_string())),
                Ok(run(9, RunStatus::Running)),
            ],
        )
        .into_arc();

    let (frames, rx) = mpsc::unbounded();
    let resolver = ContextResolver::new(backend.clone()).spawn(rx);
    let mut context = resolver.context();

    let frame = ParameterFrame::project("p1")
        .with_model("m1")
        .with_pipeline(5)
        .with_run(9);
    frames.unbounded_send(frame.clone()).unwrap();
    backend.wait_for_calls(4).await;
    settle().await;
    assert!(context.borrow_and_update().run.is_none());
    assert!(context.borrow().pipeline.is_some());

    frames.unbounded_send(frame).unwrap();
    let recovered = next_context(&mut context).await;
    assert_eq!(recovered.run.map(|r| r.status), Some(RunStatus::Running));
    assert_eq!(backend.count(&run_key("p1", "m1", 5, 9)), 2);
    assert_eq!(backend.count(&pipeline_key("p1", "m1", 5)), 1);
    resolver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_resets_every_level() {
    let backend = FakeBackend::new()
        .with_project("p1")
        .with_model("p1", "m1")
        .into_arc();

    let (frames, rx) = mpsc::unbounded();
    let resolver = ContextResolver::new(backend.clone()).spawn(rx);
    let mut context = resolver.context();

    frames
        .unbounded_send(ParameterFrame::project("p1").with_model("m1"))
        .unwrap();
    next_context(&mut context).await;
    let full = next_context(&mut context).await;
    assert_eq!(slugs(&full), (Some("p1"), Some("m1")));

    resolver.shutdown().await.unwrap();
    assert!(context.borrow().is_empty());
}

#[tokio::test]
async fn test_run_returns_when_frames_end() {
    let backend = FakeBackend::new().with_project("p1").into_arc();
    let resolver = ContextResolver::new(backend.clone());
    let context = resolver.subscribe();

    let frames = stream::iter(vec![ParameterFrame::project("p1")]);
    resolver.run(frames).await.unwrap();
    assert!(context.borrow().is_empty());
}

#[tokio::test]
async fn test_resolve_frame_walks_every_level_in_order() {
    let backend = FakeBackend::new()
        .with_project("p1")
        .with_model("p1", "m1")
        .with_pipeline("p1", "m1", 5)
        .with_run_statuses("p1", "m1", 5, 9, &[RunStatus::Running]);

    let frame = ParameterFrame::project("p1")
        .with_model("m1")
        .with_pipeline(5)
        .with_run(9);
    let state = resolve_frame(&backend, frame).await;

    assert!(state.is_settled());
    assert!(state.failure().is_none());
    let context = state.snapshot();
    assert_eq!(context.run.as_ref().map(|r| r.status), Some(RunStatus::Running));
    assert_eq!(
        backend.calls(),
        vec![
            project_key("p1"),
            model_key("p1", "m1"),
            pipeline_key("p1", "m1", 5),
            run_key("p1", "m1", 5, 9),
        ]
    );
}

#[tokio::test]
async fn test_resolve_frame_stops_below_a_failed_level() {
    let backend = FakeBackend::new().with_project("p1");
    let frame = ParameterFrame::project("p1")
        .with_model("m1")
        .with_pipeline(5);
    let state = resolve_frame(&backend, frame).await;

    let (level, error) = state.failure().unwrap();
    assert_eq!(level, Level::Model);
    assert!(error.is_not_found());
    assert_eq!(state.phase(Level::Pipeline), LevelPhase::Absent);
    assert_eq!(backend.calls().len(), 2);
}
