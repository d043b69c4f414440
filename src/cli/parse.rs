//! CLI parse: clap types for collab-console. No behavior; definitions only.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::ParameterFrame;

/// Collab Console - inspect projects, pipeline runs and audit logs
#[derive(Parser, Debug)]
#[command(name = "collab-console")]
#[command(about = "Resolve collaboration-server context, follow pipeline runs and browse audit logs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server API root, overriding configuration
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve route parameters into their entities and print the context
    Resolve {
        #[command(flatten)]
        target: TargetArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Follow a pipeline run until it finishes, printing each status change
    WatchRun {
        /// Project slug
        #[arg(long)]
        project: String,
        /// Model slug
        #[arg(long)]
        model: String,
        /// Backup pipeline id
        #[arg(long)]
        pipeline: i64,
        /// Run id
        #[arg(long)]
        run: i64,
    },
    /// Show one page of a project's or model's audit log
    Events {
        /// Project slug
        #[arg(long)]
        project: String,
        /// Model slug; shows the model's feed instead of the project's
        #[arg(long)]
        model: Option<String>,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Route parameters identifying a context.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project slug
    #[arg(long)]
    pub project: Option<String>,
    /// Model slug
    #[arg(long)]
    pub model: Option<String>,
    /// Backup pipeline id
    #[arg(long)]
    pub pipeline: Option<i64>,
    /// Run id
    #[arg(long)]
    pub run: Option<i64>,
}

impl TargetArgs {
    pub fn to_frame(&self) -> ParameterFrame {
        ParameterFrame {
            project_slug: self.project.clone(),
            model_slug: self.model.clone(),
            pipeline_id: self.pipeline,
            run_id: self.run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
