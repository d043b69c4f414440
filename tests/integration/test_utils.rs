//! Shared test utilities for integration tests
//!
//! `FakeBackend` serves canned entities, records every fetch, tracks how many
//! fetches overlap, and can hold a fetch back until the test releases it.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use collab_console::backend::{ConsoleBackend, LogParent};
use collab_console::error::BackendError;
use collab_console::types::{
    LogEntry, LogPage, Model, Pipeline, PipelineRun, Project, RunStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

pub fn project(slug: &str) -> Project {
    Project {
        id: slug.len() as i64,
        slug: slug.to_string(),
        name: format!("Project {}", slug),
        description: None,
    }
}

pub fn model(slug: &str) -> Model {
    Model {
        id: slug.len() as i64,
        slug: slug.to_string(),
        name: format!("Model {}", slug),
        description: None,
        tool: Some("Capella".to_string()),
        version: Some("6.0.0".to_string()),
    }
}

pub fn pipeline(id: i64) -> Pipeline {
    Pipeline {
        id,
        run_nightly: false,
        include_commit_history: false,
        t4c_model: None,
        git_model: None,
    }
}

pub fn run(id: i64, status: RunStatus) -> PipelineRun {
    PipelineRun {
        id,
        status,
        trigger_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        triggerer: Some("admin".to_string()),
    }
}

pub fn entries(count: usize) -> Vec<LogEntry> {
    (0..count)
        .map(|i| LogEntry {
            id: i as i64 + 1,
            event_type: "ProjectUserAssigned".to_string(),
            execution_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, i as u32 % 60).unwrap(),
            executor: Some("admin".to_string()),
            user: Some(format!("user{}", i)),
            reason: None,
        })
        .collect()
}

pub fn project_parent(slug: &str) -> LogParent {
    LogParent::Project {
        project_slug: slug.to_string(),
    }
}

/// Fetch keys as recorded in `FakeBackend::calls`.
pub fn project_key(p: &str) -> String {
    format!("project:{}", p)
}

pub fn model_key(p: &str, m: &str) -> String {
    format!("model:{}/{}", p, m)
}

pub fn pipeline_key(p: &str, m: &str, id: i64) -> String {
    format!("pipeline:{}/{}/{}", p, m, id)
}

pub fn run_key(p: &str, m: &str, pipeline_id: i64, run_id: i64) -> String {
    format!("run:{}/{}/{}/{}", p, m, pipeline_id, run_id)
}

pub fn log_key(parent: &LogParent, page: u32) -> String {
    format!("log:{}:{}", parent, page)
}

#[derive(Default)]
struct Fixtures {
    projects: HashMap<String, Project>,
    models: HashMap<(String, String), Model>,
    pipelines: HashMap<(String, String, i64), Pipeline>,
    runs: HashMap<(String, String, i64, i64), VecDeque<Result<PipelineRun, BackendError>>>,
    feeds: HashMap<LogParent, Vec<LogEntry>>,
    pages: HashMap<(LogParent, u32), VecDeque<Result<LogPage, BackendError>>>,
}

pub struct FakeBackend {
    fixtures: Mutex<Fixtures>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_count: watch::Sender<usize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (call_count, _) = watch::channel(0);
        Self {
            fixtures: Mutex::new(Fixtures::default()),
            gates: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            call_count,
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn with_project(self, p: &str) -> Self {
        self.fixtures
            .lock()
            .projects
            .insert(p.to_string(), project(p));
        self
    }

    pub fn with_model(self, p: &str, m: &str) -> Self {
        self.fixtures
            .lock()
            .models
            .insert((p.to_string(), m.to_string()), model(m));
        self
    }

    pub fn with_pipeline(self, p: &str, m: &str, id: i64) -> Self {
        self.fixtures
            .lock()
            .pipelines
            .insert((p.to_string(), m.to_string(), id), pipeline(id));
        self
    }

    /// Script the run's statuses; the last one repeats once the script runs out.
    pub fn with_run_statuses(self, p: &str, m: &str, pipeline_id: i64, run_id: i64, statuses: &[RunStatus]) -> Self {
        let script = statuses.iter().map(|s| Ok(run(run_id, *s))).collect();
        self.fixtures
            .lock()
            .runs
            .insert((p.to_string(), m.to_string(), pipeline_id, run_id), script);
        self
    }

    pub fn with_run_script(
        self,
        p: &str,
        m: &str,
        pipeline_id: i64,
        run_id: i64,
        script: Vec<Result<PipelineRun, BackendError>>,
    ) -> Self {
        self.fixtures
            .lock()
            .runs
            .insert((p.to_string(), m.to_string(), pipeline_id, run_id), script.into());
        self
    }

    /// Serve `entries` as a feed, paginated by the requested page size.
    pub fn with_feed(self, parent: LogParent, entries: Vec<LogEntry>) -> Self {
        self.fixtures.lock().feeds.insert(parent, entries);
        self
    }

    /// Script responses for one page, overriding the feed.
    pub fn with_page_script(self, parent: LogParent, page: u32, script: Vec<Result<LogPage, BackendError>>) -> Self {
        self.fixtures
            .lock()
            .pages
            .insert((parent, page), script.into());
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Hold every fetch of `key` until `release` is called for it.
    pub fn gate(&self, key: &str) {
        self.gates
            .lock()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let one held fetch of `key` proceed.
    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().get(key) {
            gate.add_permits(1);
        }
    }

    /// Let every fetch of `key` proceed from now on.
    pub fn open(&self, key: &str) {
        if let Some(gate) = self.gates.lock().remove(key) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == key).count()
    }

    /// Fetches that returned, in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut count = self.call_count.subscribe();
        while *count.borrow_and_update() < n {
            if count.changed().await.is_err() {
                return;
            }
        }
    }

    async fn enter<T>(&self, key: String, respond: impl FnOnce(&mut Fixtures) -> Result<T, BackendError>) -> Result<T, BackendError> {
        self.calls.lock().push(key.clone());
        self.call_count.send_modify(|n| *n += 1);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.gates.lock().get(&key).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = {
            let mut fixtures = self.fixtures.lock();
            respond(&mut *fixtures)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().push(key);
        result
    }
}

fn not_found(what: String) -> BackendError {
    BackendError::NotFound(what)
}

fn next_scripted<T: Clone>(script: &mut VecDeque<Result<T, BackendError>>) -> Option<Result<T, BackendError>> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

#[async_trait]
impl ConsoleBackend for FakeBackend {
    async fn fetch_project(&self, project_slug: &str) -> Result<Project, BackendError> {
        let key = project_key(project_slug);
        self.enter(key.clone(), |f| {
            f.projects.get(project_slug).cloned().ok_or_else(|| not_found(key))
        })
        .await
    }

    async fn fetch_model(&self, project_slug: &str, model_slug: &str) -> Result<Model, BackendError> {
        let key = model_key(project_slug, model_slug);
        self.enter(key.clone(), |f| {
            f.models
                .get(&(project_slug.to_string(), model_slug.to_string()))
                .cloned()
                .ok_or_else(|| not_found(key))
        })
        .await
    }

    async fn fetch_pipeline(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
    ) -> Result<Pipeline, BackendError> {
        let key = pipeline_key(project_slug, model_slug, pipeline_id);
        self.enter(key.clone(), |f| {
            f.pipelines
                .get(&(project_slug.to_string(), model_slug.to_string(), pipeline_id))
                .cloned()
                .ok_or_else(|| not_found(key))
        })
        .await
    }

    async fn fetch_run(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
        run_id: i64,
    ) -> Result<PipelineRun, BackendError> {
        let key = run_key(project_slug, model_slug, pipeline_id, run_id);
        self.enter(key.clone(), |f| {
            f.runs
                .get_mut(&(project_slug.to_string(), model_slug.to_string(), pipeline_id, run_id))
                .and_then(next_scripted)
                .unwrap_or_else(|| Err(not_found(key)))
        })
        .await
    }

    async fn fetch_log_page(
        &self,
        parent: &LogParent,
        page: u32,
        page_size: u32,
    ) -> Result<LogPage, BackendError> {
        let key = log_key(parent, page);
        self.enter(key.clone(), |f| {
            if let Some(script) = f.pages.get_mut(&(parent.clone(), page)) {
                if let Some(result) = next_scripted(script) {
                    return result;
                }
            }
            let feed = f.feeds.get(parent).ok_or_else(|| not_found(key))?;
            let size = page_size.max(1) as usize;
            let total_pages = feed.len().div_ceil(size) as u32;
            let start = (page as usize).saturating_sub(1) * size;
            let items = feed.iter().skip(start).take(size).cloned().collect();
            Ok(LogPage {
                items,
                page,
                total_pages,
            })
        })
        .await
    }
}

/// Yield to the runtime until spawned tasks have had a chance to run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
