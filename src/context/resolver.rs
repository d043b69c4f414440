//! Context resolver driver.
//!
//! Runs a [`ResolverState`] on a single task: parameter frames and fetch
//! completions are handled one at a time, and every resulting snapshot is
//! published on a `watch` channel. Fetches are futures owned by the task, so
//! a superseded fetch still completes and its result is dropped on arrival.

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::backend::ConsoleBackend;
use crate::context::state::ResolverState;
use crate::context::types::{Entity, FetchCommand, FetchOutcome, LevelKey, ResolvedContext};
use crate::error::{BackendError, ConsoleError};
use crate::types::ParameterFrame;

pub struct ContextResolver<B: ConsoleBackend + ?Sized> {
    backend: Arc<B>,
    state: ResolverState,
    publisher: watch::Sender<ResolvedContext>,
}

impl<B: ConsoleBackend + ?Sized + 'static> ContextResolver<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (publisher, _) = watch::channel(ResolvedContext::default());
        Self {
            backend,
            state: ResolverState::new(),
            publisher,
        }
    }

    /// Receiver for the current context; the latest snapshot is always readable.
    pub fn subscribe(&self) -> watch::Receiver<ResolvedContext> {
        self.publisher.subscribe()
    }

    /// Resolve frames until the stream ends, then reset every level.
    ///
    /// Returns an error only for invariant violations.
    pub async fn run<S>(mut self, frames: S) -> Result<(), ConsoleError>
    where
        S: Stream<Item = ParameterFrame>,
    {
        let mut frames = std::pin::pin!(frames);
        let mut in_flight: FuturesUnordered<BoxFuture<'static, FetchOutcome>> =
            FuturesUnordered::new();

        let result = loop {
            let commands = tokio::select! {
                frame = frames.next() => match frame {
                    Some(frame) => self.state.apply_frame(frame),
                    None => break Ok(()),
                },
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    self.state.complete(outcome)
                }
            };
            for command in commands {
                in_flight.push(self.fetch(command));
            }
            if let Err(e) = self.publish() {
                break Err(e);
            }
        };

        if !in_flight.is_empty() {
            debug!(pending = in_flight.len(), "Discarding in-flight fetches on teardown");
        }
        self.state.reset();
        self.publisher.send_replace(ResolvedContext::default());
        info!("Context resolver stopped");
        result
    }

    /// Run on the tokio runtime. Dropping the handle detaches the consumer and
    /// tears the resolver down.
    pub fn spawn<S>(self, frames: S) -> ResolverHandle
    where
        S: Stream<Item = ParameterFrame> + Send + 'static,
    {
        let context = self.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let frames = frames.take_until(shutdown_rx);
        let task = tokio::spawn(self.run(frames));
        ResolverHandle {
            context,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    fn publish(&self) -> Result<(), ConsoleError> {
        let snapshot = self.state.snapshot();
        if let Err(violation) = snapshot.check_nesting() {
            error!(error = %violation, "Resolved context violates nesting");
            return Err(violation.into());
        }
        self.publisher.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        Ok(())
    }

    fn fetch(&self, command: FetchCommand) -> BoxFuture<'static, FetchOutcome> {
        let backend = Arc::clone(&self.backend);
        let FetchCommand { generation, key } = command;
        async move {
            let level = key.level();
            let result = fetch_level(backend.as_ref(), &key).await;
            FetchOutcome {
                generation,
                level,
                result,
            }
        }
        .boxed()
    }
}

/// Fetch the entity a level key identifies.
pub async fn fetch_level<B: ConsoleBackend + ?Sized>(
    backend: &B,
    key: &LevelKey,
) -> Result<Entity, BackendError> {
    match key {
        LevelKey::Project { project_slug } => {
            backend.fetch_project(project_slug).await.map(Entity::Project)
        }
        LevelKey::Model {
            project_slug,
            model_slug,
        } => backend
            .fetch_model(project_slug, model_slug)
            .await
            .map(Entity::Model),
        LevelKey::Pipeline {
            project_slug,
            model_slug,
            pipeline_id,
        } => backend
            .fetch_pipeline(project_slug, model_slug, *pipeline_id)
            .await
            .map(Entity::Pipeline),
        LevelKey::Run(run) => backend
            .fetch_run(&run.project_slug, &run.model_slug, run.pipeline_id, run.run_id)
            .await
            .map(Entity::Run),
    }
}

/// Resolve a single frame to completion without a long-lived resolver.
///
/// Returns the settled state so callers can inspect which level failed.
pub async fn resolve_frame<B: ConsoleBackend + ?Sized>(
    backend: &B,
    frame: ParameterFrame,
) -> ResolverState {
    let mut state = ResolverState::new();
    let mut pending = state.apply_frame(frame);
    while let Some(FetchCommand { generation, key }) = pending.pop() {
        let level = key.level();
        let result = fetch_level(backend, &key).await;
        pending.extend(state.complete(FetchOutcome {
            generation,
            level,
            result,
        }));
    }
    state
}

/// Handle to a spawned resolver.
pub struct ResolverHandle {
    context: watch::Receiver<ResolvedContext>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ConsoleError>>,
}

impl ResolverHandle {
    pub fn context(&self) -> watch::Receiver<ResolvedContext> {
        self.context.clone()
    }

    /// Detach the consumer: resets all levels and waits for the resolver to stop.
    pub async fn shutdown(mut self) -> Result<(), ConsoleError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => Err(ConsoleError::Task(e.to_string())),
        }
    }
}
