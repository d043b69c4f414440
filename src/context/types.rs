//! Shared context types used by the resolver state machine and its driver.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::{LogParent, RunRef};
use crate::error::{BackendError, InvariantViolation};
use crate::types::{Model, ParameterFrame, Pipeline, PipelineRun, Project};

/// One level of the nested context, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Project,
    Model,
    Pipeline,
    Run,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Project, Level::Model, Level::Pipeline, Level::Run];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Project => None,
            Level::Model => Some(Level::Project),
            Level::Pipeline => Some(Level::Model),
            Level::Run => Some(Level::Pipeline),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Project => "project",
            Level::Model => "model",
            Level::Pipeline => "pipeline",
            Level::Run => "run",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a level: the full parameter path down to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LevelKey {
    Project {
        project_slug: String,
    },
    Model {
        project_slug: String,
        model_slug: String,
    },
    Pipeline {
        project_slug: String,
        model_slug: String,
        pipeline_id: i64,
    },
    Run(RunRef),
}

impl LevelKey {
    /// Build the key for `level`, or `None` if the frame lacks any field on the path.
    pub fn from_frame(level: Level, frame: &ParameterFrame) -> Option<Self> {
        let project_slug = frame.project_slug.clone()?;
        if level == Level::Project {
            return Some(LevelKey::Project { project_slug });
        }
        let model_slug = frame.model_slug.clone()?;
        if level == Level::Model {
            return Some(LevelKey::Model {
                project_slug,
                model_slug,
            });
        }
        let pipeline_id = frame.pipeline_id?;
        if level == Level::Pipeline {
            return Some(LevelKey::Pipeline {
                project_slug,
                model_slug,
                pipeline_id,
            });
        }
        let run_id = frame.run_id?;
        Some(LevelKey::Run(RunRef {
            project_slug,
            model_slug,
            pipeline_id,
            run_id,
        }))
    }

    pub fn level(&self) -> Level {
        match self {
            LevelKey::Project { .. } => Level::Project,
            LevelKey::Model { .. } => Level::Model,
            LevelKey::Pipeline { .. } => Level::Pipeline,
            LevelKey::Run(_) => Level::Run,
        }
    }
}

/// A fetched entity for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Project(Project),
    Model(Model),
    Pipeline(Pipeline),
    Run(PipelineRun),
}

impl Entity {
    pub fn level(&self) -> Level {
        match self {
            Entity::Project(_) => Level::Project,
            Entity::Model(_) => Level::Model,
            Entity::Pipeline(_) => Level::Pipeline,
            Entity::Run(_) => Level::Run,
        }
    }
}

/// Fetch the resolver wants issued, tagged with the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCommand {
    pub generation: u64,
    pub key: LevelKey,
}

/// Result of a [`FetchCommand`], fed back into the resolver.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub generation: u64,
    pub level: Level,
    pub result: Result<Entity, BackendError>,
}

/// Observable phase of a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelPhase {
    Absent,
    Resolving,
    Resolved,
    /// The last fetch for the current key failed; the level reads as absent.
    Failed,
}

/// The nested entity context currently in focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub project: Option<Project>,
    pub model: Option<Model>,
    pub pipeline: Option<Pipeline>,
    pub run: Option<PipelineRun>,
}

impl ResolvedContext {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.model.is_none() && self.pipeline.is_none() && self.run.is_none()
    }

    /// Verify that no level is populated without all of its ancestors.
    pub fn check_nesting(&self) -> Result<(), InvariantViolation> {
        let present = [
            self.project.is_some(),
            self.model.is_some(),
            self.pipeline.is_some(),
            self.run.is_some(),
        ];
        for level in Level::ALL {
            if let Some(parent) = level.parent() {
                if present[level.index()] && !present[parent.index()] {
                    return Err(InvariantViolation::OrphanedLevel { level });
                }
            }
        }
        Ok(())
    }

    /// Path to the resolved run, if the context reaches that deep.
    pub fn run_ref(&self) -> Option<RunRef> {
        match (&self.project, &self.model, &self.pipeline, &self.run) {
            (Some(project), Some(model), Some(pipeline), Some(run)) => Some(RunRef {
                project_slug: project.slug.clone(),
                model_slug: model.slug.clone(),
                pipeline_id: pipeline.id,
                run_id: run.id,
            }),
            _ => None,
        }
    }

    pub fn project_log_parent(&self) -> Option<LogParent> {
        self.project.as_ref().map(|project| LogParent::Project {
            project_slug: project.slug.clone(),
        })
    }

    pub fn model_log_parent(&self) -> Option<LogParent> {
        match (&self.project, &self.model) {
            (Some(project), Some(model)) => Some(LogParent::Model {
                project_slug: project.slug.clone(),
                model_slug: model.slug.clone(),
            }),
            _ => None,
        }
    }
}
