//! HTTP backend client built on `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ConsoleBackend, LogParent};
use crate::config::BackendConfig;
use crate::error::{BackendError, ConsoleError};
use crate::types::{LogEntry, LogPage, Model, Pipeline, PipelineRun, Project};

/// Paginated envelope returned by list endpoints.
#[derive(Deserialize)]
struct PageEnvelope {
    items: Vec<LogEntry>,
    #[serde(default)]
    total: Option<u64>,
    page: u32,
    #[serde(default)]
    size: Option<u32>,
    #[serde(default)]
    pages: Option<u32>,
}

impl PageEnvelope {
    fn into_page(self) -> Result<LogPage, BackendError> {
        let total_pages = match (self.pages, self.total, self.size) {
            (Some(pages), _, _) => pages,
            (None, Some(total), Some(size)) if size > 0 => {
                u32::try_from(total.div_ceil(u64::from(size))).map_err(|_| {
                    BackendError::Decode(format!("page count overflow for {} items", total))
                })?
            }
            _ => {
                return Err(BackendError::Decode(
                    "response carries no total page count".to_string(),
                ))
            }
        };
        Ok(LogPage {
            items: self.items,
            page: self.page,
            total_pages,
        })
    }
}

// Helper function to map non-success statuses to BackendError
fn map_status(status: StatusCode, what: &str) -> BackendError {
    match status.as_u16() {
        404 => BackendError::NotFound(what.to_string()),
        401 | 403 => BackendError::Unauthorized(format!("{} ({})", what, status)),
        code => BackendError::Status {
            status: code,
            message: what.to_string(),
        },
    }
}

// Helper function to map transport errors to BackendError
fn map_http_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        BackendError::Transport(format!("Connection error: {}", error))
    } else if error.is_decode() {
        BackendError::Decode(error.to_string())
    } else {
        BackendError::Transport(format!("HTTP error: {}", error))
    }
}

/// REST client for the console backend
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConsoleError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConsoleError::ConfigError(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::ConfigError(format!(
                "Base URL {} cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConsoleError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ConsoleError> {
        Self::new(
            &config.base_url,
            config.token.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidRequest(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn model_segments<'a>(project_slug: &'a str, model_slug: &'a str) -> Vec<&'a str> {
        vec!["projects", project_slug, "models", model_slug]
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, BackendError> {
        debug!(url = %url, "GET");
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, what));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl ConsoleBackend for HttpBackend {
    async fn fetch_project(&self, project_slug: &str) -> Result<Project, BackendError> {
        let url = self.endpoint(&["projects", project_slug])?;
        self.get_json(url, &format!("project {}", project_slug)).await
    }

    async fn fetch_model(
        &self,
        project_slug: &str,
        model_slug: &str,
    ) -> Result<Model, BackendError> {
        let url = self.endpoint(&Self::model_segments(project_slug, model_slug))?;
        self.get_json(url, &format!("model {}/{}", project_slug, model_slug))
            .await
    }

    async fn fetch_pipeline(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
    ) -> Result<Pipeline, BackendError> {
        let id = pipeline_id.to_string();
        let mut segments = Self::model_segments(project_slug, model_slug);
        segments.extend(["backups", "pipelines", id.as_str()]);
        let url = self.endpoint(&segments)?;
        self.get_json(url, &format!("pipeline {}", pipeline_id)).await
    }

    async fn fetch_run(
        &self,
        project_slug: &str,
        model_slug: &str,
        pipeline_id: i64,
        run_id: i64,
    ) -> Result<PipelineRun, BackendError> {
        let pipeline = pipeline_id.to_string();
        let run = run_id.to_string();
        let mut segments = Self::model_segments(project_slug, model_slug);
        segments.extend(["backups", "pipelines", pipeline.as_str(), "runs", run.as_str()]);
        let url = self.endpoint(&segments)?;
        self.get_json(url, &format!("pipeline run {}", run_id)).await
    }

    async fn fetch_log_page(
        &self,
        parent: &LogParent,
        page: u32,
        page_size: u32,
    ) -> Result<LogPage, BackendError> {
        let mut segments = match parent {
            LogParent::Project { project_slug } => vec!["projects", project_slug.as_str()],
            LogParent::Model {
                project_slug,
                model_slug,
            } => Self::model_segments(project_slug, model_slug),
        };
        segments.push("events");
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &page_size.to_string());

        let envelope: PageEnvelope = self
            .get_json(url, &format!("events of {} (page {})", parent, page))
            .await?;
        envelope.into_page()
    }
}
