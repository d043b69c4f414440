//! Core entity types shared by the resolver, poller and log cache.
//!
//! All records are plain values decoded from the backend's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifying parameters produced by the navigation layer.
///
/// Any field may be absent; frames may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFrame {
    pub project_slug: Option<String>,
    pub model_slug: Option<String>,
    pub pipeline_id: Option<i64>,
    pub run_id: Option<i64>,
}

impl ParameterFrame {
    pub fn project(slug: impl Into<String>) -> Self {
        Self {
            project_slug: Some(slug.into()),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, slug: impl Into<String>) -> Self {
        self.model_slug = Some(slug.into());
        self
    }

    pub fn with_pipeline(mut self, id: i64) -> Self {
        self.pipeline_id = Some(id);
        self
    }

    pub fn with_run(mut self, id: i64) -> Self {
        self.run_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Backup pipeline attached to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    #[serde(default)]
    pub run_nightly: bool,
    #[serde(default)]
    pub include_commit_history: bool,
    #[serde(default)]
    pub t4c_model: Option<String>,
    #[serde(default)]
    pub git_model: Option<String>,
}

/// Status of a pipeline run as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Scheduled,
    Running,
    Timeout,
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// The only statuses for which further progress is expected.
    ///
    /// Every "is this run still active" decision goes through this set.
    pub const IN_PROGRESS: [RunStatus; 3] =
        [RunStatus::Pending, RunStatus::Scheduled, RunStatus::Running];

    pub fn is_in_progress(self) -> bool {
        Self::IN_PROGRESS.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_in_progress()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Scheduled => "scheduled",
            RunStatus::Running => "running",
            RunStatus::Timeout => "timeout",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: i64,
    pub status: RunStatus,
    pub trigger_time: DateTime<Utc>,
    #[serde(default)]
    pub triggerer: Option<String>,
}

impl PipelineRun {
    pub fn is_active(&self) -> bool {
        self.status.is_in_progress()
    }
}

/// One audit-log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub event_type: String,
    pub execution_time: DateTime<Utc>,
    #[serde(default)]
    pub executor: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One page of an audit-log feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    pub items: Vec<LogEntry>,
    /// 1-based page index
    pub page: u32,
    pub total_pages: u32,
}
