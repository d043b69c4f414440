//! Consumers that wire the resolver's output into pollers and log caches.
//!
//! `RunMonitor` keeps a live copy of whatever run the context points at,
//! starting a poller for in-progress runs and stopping it when the run goes
//! away. `follow_log_parent` keeps a log cache pointed at the current project
//! or model.

use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::audit_log::PaginatedLogCache;
use crate::backend::{ConsoleBackend, LogParent, RunRef};
use crate::context::ResolvedContext;
use crate::poller::{PollerHandle, PolledRun, RunStatusPoller};
use crate::types::PipelineRun;

struct Watching {
    run: RunRef,
    poller: Option<PollerHandle>,
    updates: Option<watch::Receiver<Option<PolledRun>>>,
}

impl Drop for Watching {
    fn drop(&mut self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }
}

/// Next snapshot from the active poller; never resolves when there is none.
async fn next_polled(watching: &mut Option<Watching>) -> Option<PipelineRun> {
    let Some(updates) = watching.as_mut().and_then(|w| w.updates.as_mut()) else {
        return future::pending().await;
    };
    if updates.changed().await.is_err() {
        return future::pending().await;
    }
    let polled = updates.borrow_and_update().clone();
    polled.map(|p| p.run)
}

pub struct RunMonitor<B: ConsoleBackend + ?Sized> {
    backend: Arc<B>,
    interval: Duration,
    publisher: watch::Sender<Option<PipelineRun>>,
}

impl<B: ConsoleBackend + ?Sized + 'static> RunMonitor<B> {
    pub fn new(backend: Arc<B>, interval: Duration) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            backend,
            interval,
            publisher,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PipelineRun>> {
        self.publisher.subscribe()
    }

    /// Follow `context` until its sender is dropped.
    pub async fn run(self, mut context: watch::Receiver<ResolvedContext>) {
        let mut watching: Option<Watching> = None;
        loop {
            let (run_ref, resolved_run) = {
                let current = context.borrow_and_update();
                (current.run_ref(), current.run.clone())
            };

            if watching.as_ref().map(|w| &w.run) != run_ref.as_ref() {
                if let Some(previous) = watching.take() {
                    debug!(run = %previous.run, "Run left the context");
                }
                self.publisher.send_replace(resolved_run.clone());
                if let (Some(run_ref), Some(resolved_run)) = (run_ref, resolved_run) {
                    watching = Some(self.watch(run_ref, &resolved_run, context.clone()));
                }
            }

            tokio::select! {
                changed = context.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(run) = next_polled(&mut watching) => {
                    self.publisher.send_replace(Some(run));
                }
            }
        }

        drop(watching);
        self.publisher.send_replace(None);
    }

    pub fn spawn(self, context: watch::Receiver<ResolvedContext>) -> MonitorHandle {
        let run = self.subscribe();
        let task = tokio::spawn(self.run(context));
        MonitorHandle { run, task }
    }

    fn watch(
        &self,
        run_ref: RunRef,
        resolved: &PipelineRun,
        context: watch::Receiver<ResolvedContext>,
    ) -> Watching {
        if !resolved.is_active() {
            debug!(run = %run_ref, status = %resolved.status, "Run already finished, not polling");
            return Watching {
                run: run_ref,
                poller: None,
                updates: None,
            };
        }
        let poller = RunStatusPoller::new(Arc::clone(&self.backend), run_ref.clone(), self.interval)
            .spawn(context);
        let updates = poller.updates();
        Watching {
            run: run_ref,
            poller: Some(poller),
            updates: Some(updates),
        }
    }
}

/// Handle to a spawned run monitor.
pub struct MonitorHandle {
    run: watch::Receiver<Option<PipelineRun>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn run(&self) -> watch::Receiver<Option<PipelineRun>> {
        self.run.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Which entity's feed a log cache follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope {
    Project,
    Model,
}

impl LogScope {
    pub fn parent_of(self, context: &ResolvedContext) -> Option<LogParent> {
        match self {
            LogScope::Project => context.project_log_parent(),
            LogScope::Model => context.model_log_parent(),
        }
    }
}

/// Keep `cache` pointed at the scoped parent of `context`, resetting it on change.
pub fn follow_log_parent<B: ConsoleBackend + ?Sized + 'static>(
    cache: PaginatedLogCache<B>,
    mut context: watch::Receiver<ResolvedContext>,
    scope: LogScope,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let parent = scope.parent_of(&context.borrow_and_update());
            cache.set_parent(parent);
            if context.changed().await.is_err() {
                cache.set_parent(None);
                break;
            }
        }
    })
}
