//! Run Status Poller
//!
//! Refetches one pipeline run at a fixed cadence until its status leaves the
//! in-progress set. Fetches are strictly sequential: the next one is issued
//! `interval` after the previous one finished, whatever the latency. The
//! poller follows the resolver's context and stops as soon as the run is no
//! longer in it; a fetch still in flight at that point is left to finish on
//! its own and its result is ignored.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{ConsoleBackend, RunRef};
use crate::context::ResolvedContext;
use crate::error::{BackendError, ConsoleError};
use crate::types::PipelineRun;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Latest fetched snapshot and how many snapshots have been observed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledRun {
    pub run: PipelineRun,
    pub observed: u64,
}

/// Why a poller stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A terminal snapshot was observed.
    Finished(PipelineRun),
    /// The run left the resolved context.
    Detached,
}

pub struct RunStatusPoller<B: ConsoleBackend + ?Sized> {
    backend: Arc<B>,
    run: RunRef,
    interval: Duration,
    publisher: watch::Sender<Option<PolledRun>>,
}

impl<B: ConsoleBackend + ?Sized + 'static> RunStatusPoller<B> {
    pub fn new(backend: Arc<B>, run: RunRef, interval: Duration) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            backend,
            run,
            interval,
            publisher,
        }
    }

    pub fn run_ref(&self) -> &RunRef {
        &self.run
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PolledRun>> {
        self.publisher.subscribe()
    }

    /// Poll until a terminal status is observed or the run leaves `context`.
    pub async fn run(self, mut context: watch::Receiver<ResolvedContext>) -> PollOutcome {
        let mut observed = 0u64;
        loop {
            let current = context.borrow_and_update().run_ref();
            if current.as_ref() != Some(&self.run) {
                info!(run = %self.run, "Run left the context, poller stopped");
                return PollOutcome::Detached;
            }

            let fetch = self.spawn_fetch();
            let result = tokio::select! {
                biased;
                _ = detached(&mut context, &self.run) => {
                    debug!(run = %self.run, "Poller detached with a fetch in flight");
                    return PollOutcome::Detached;
                }
                joined = fetch => joined
                    .map_err(|e| BackendError::Transport(format!("poll task failed: {}", e)))
                    .and_then(|result| result),
            };

            match result {
                Ok(run) => {
                    observed += 1;
                    debug!(run = %self.run, status = %run.status, observed, "Polled run");
                    let terminal = run.status.is_terminal();
                    self.publisher.send_replace(Some(PolledRun {
                        run: run.clone(),
                        observed,
                    }));
                    if terminal {
                        info!(run = %self.run, status = %run.status, "Run finished");
                        return PollOutcome::Finished(run);
                    }
                }
                Err(error) => {
                    warn!(run = %self.run, error = %error, "Run poll failed, retrying next tick");
                }
            }

            tokio::select! {
                biased;
                _ = detached(&mut context, &self.run) => {
                    info!(run = %self.run, "Run left the context, poller stopped");
                    return PollOutcome::Detached;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    pub fn spawn(self, context: watch::Receiver<ResolvedContext>) -> PollerHandle {
        let updates = self.subscribe();
        let task = tokio::spawn(self.run(context));
        PollerHandle { updates, task }
    }

    fn spawn_fetch(&self) -> JoinHandle<Result<PipelineRun, BackendError>> {
        let backend = Arc::clone(&self.backend);
        let run = self.run.clone();
        tokio::spawn(async move {
            backend
                .fetch_run(&run.project_slug, &run.model_slug, run.pipeline_id, run.run_id)
                .await
        })
    }
}

/// Resolves once `context` no longer holds `run`, or its sender is gone.
async fn detached(context: &mut watch::Receiver<ResolvedContext>, run: &RunRef) {
    loop {
        if context.changed().await.is_err() {
            return;
        }
        let current = context.borrow_and_update().run_ref();
        if current.as_ref() != Some(run) {
            return;
        }
    }
}

/// Handle to a spawned poller.
pub struct PollerHandle {
    updates: watch::Receiver<Option<PolledRun>>,
    task: JoinHandle<PollOutcome>,
}

impl PollerHandle {
    pub fn updates(&self) -> watch::Receiver<Option<PolledRun>> {
        self.updates.clone()
    }

    pub fn latest(&self) -> Option<PolledRun> {
        self.updates.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling. A fetch in flight finishes in the background and is ignored.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub async fn join(self) -> Result<PollOutcome, ConsoleError> {
        self.task
            .await
            .map_err(|e| ConsoleError::Task(e.to_string()))
    }
}
