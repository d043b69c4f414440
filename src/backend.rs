//! Backend Abstraction
//!
//! The read operations the coordination core needs from the console's REST
//! backend. Components receive an implementation by construction
//! (`Arc<B: ConsoleBackend>`), so tests substitute scripted fakes and several
//! independent instances can run side by side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackendError;
use crate::types::{LogPage, Model, Pipeline, PipelineRun, Project};

pub mod http;

pub use http::HttpBackend;

/// Entity that owns an audit-log feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogParent {
    Project { project_slug: String },
    Model { project_slug: String, model_slug: String },
}

impl LogParent {
    pub fn project_slug(&self) -> &str {
        match self {
            LogParent::Project { project_slug } => project_slug,
            LogParent::Model { project_slug, .. } => project_slug,
        }
    }
}

impl fmt::Display for LogParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogParent::Project { project_slug } => write!(f, "{}", project_slug),
            LogParent::Model {
                project_slug,
                model_slug,
            } => write!(f, "{}/{}", project_slug, model_slug),
        }
    }
}

/// Full path to a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunRef {
    pub project_slug: String,
    pub model_slug: String,
    pub pipeline_id: i64,
    pub run_id: i64,
}

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/pipelines/{}/runs/{}",
            self.project_slug, self.model_slug, self.pipeline_id, self.run_id
        )
    }
}

/// Console backend client trait
#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    async fn fetch_project(&self, project_slug: &str) -> Result<Project, BackendError>;

    async fn fetch_model(&self, project_slug: &str, model_slug: &str)
        -> Result<Model, BackendError>;

    async fn fetch_pipeline(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
    ) -> Result<Pipeline, BackendError>;

    /// Used both for the initial resolve and for every poll tick.
    async fn fetch_run(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
        run_id: i64,
    ) -> Result<PipelineRun, BackendError>;

    /// Fetch one page of a log feed. Every response carries the total page count.
    async fn fetch_log_page(
        &self,
        parent: &LogParent,
        page: u32,
        page_size: u32,
    ) -> Result<LogPage, BackendError>;
}
