//! CLI route: single route table and run context. Wires commands to the
//! resolver, run monitor and log cache, then hands results to presentation.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::audit_log::{PageEntry, PaginatedLogCache};
use crate::backend::{ConsoleBackend, HttpBackend, LogParent};
use crate::cli::parse::{Cli, Commands, OutputFormat, TargetArgs};
use crate::cli::presentation::{
    format_context_json, format_context_text, format_events_table, format_status_line,
};
use crate::config::{ConfigLoader, ConsoleConfig};
use crate::context::{resolve_frame, Level};
use crate::error::{ConsoleError, LogCacheError};
use crate::monitor::RunMonitor;
use crate::types::ParameterFrame;

/// Runtime context for CLI execution: effective configuration and the backend.
pub struct RunContext<B: ConsoleBackend + ?Sized = HttpBackend> {
    config: ConsoleConfig,
    backend: Arc<B>,
    color: bool,
}

impl RunContext<HttpBackend> {
    /// Load configuration for `cli`: config files, environment, then `--base-url`.
    pub fn load_config(cli: &Cli) -> Result<ConsoleConfig, ConsoleError> {
        let mut config = ConfigLoader::new()
            .with_explicit_file(cli.config.clone())
            .load()?;
        if let Some(base_url) = &cli.base_url {
            config.backend.base_url = base_url.clone();
            config = config.validated()?;
        }
        Ok(config)
    }

    pub fn new(config: ConsoleConfig) -> Result<Self, ConsoleError> {
        let backend = Arc::new(HttpBackend::from_config(&config.backend)?);
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: ConsoleBackend + ?Sized + 'static> RunContext<B> {
    pub fn with_backend(config: ConsoleConfig, backend: Arc<B>) -> Self {
        Self {
            color: config.logging.color && std::io::stdout().is_terminal(),
            config,
            backend,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Run `command`, writing its output to `out`.
    pub async fn execute<W: Write>(&self, command: &Commands, out: &mut W) -> Result<(), ConsoleError> {
        match command {
            Commands::Resolve { target, format } => self.resolve(target, *format, out).await,
            Commands::WatchRun {
                project,
                model,
                pipeline,
                run,
            } => {
                let frame = ParameterFrame::project(project.as_str())
                    .with_model(model.as_str())
                    .with_pipeline(*pipeline)
                    .with_run(*run);
                self.watch_run(frame, out).await
            }
            Commands::Events {
                project,
                model,
                page,
            } => {
                let parent = match model {
                    Some(model) => LogParent::Model {
                        project_slug: project.clone(),
                        model_slug: model.clone(),
                    },
                    None => LogParent::Project {
                        project_slug: project.clone(),
                    },
                };
                self.events(parent, *page, out).await
            }
            Commands::Config => {
                writeln!(out, "{}", self.config.to_redacted_toml()?)?;
                Ok(())
            }
        }
    }

    async fn resolve<W: Write>(
        &self,
        target: &TargetArgs,
        format: OutputFormat,
        out: &mut W,
    ) -> Result<(), ConsoleError> {
        let state = resolve_frame(self.backend.as_ref(), target.to_frame()).await;
        if let Some((level, error)) = state.failure() {
            return Err(ConsoleError::Unresolved(format!("{}: {}", level, error)));
        }
        let context = state.snapshot();
        let rendered = match format {
            OutputFormat::Text => format_context_text(&context, self.color),
            OutputFormat::Json => format_context_json(&context)?,
        };
        writeln!(out, "{}", rendered.trim_end())?;
        Ok(())
    }

    async fn watch_run<W: Write>(&self, frame: ParameterFrame, out: &mut W) -> Result<(), ConsoleError> {
        let initial = resolve_frame(self.backend.as_ref(), frame).await;
        if let Some((level, error)) = initial.failure() {
            return Err(ConsoleError::Unresolved(format!("{}: {}", level, error)));
        }
        let Some(run) = initial.snapshot().run else {
            return Err(ConsoleError::Unresolved(Level::Run.to_string()));
        };
        writeln!(out, "{}", format_status_line(&run, self.color))?;
        if !run.is_active() {
            return Ok(());
        }

        // The resolved context stays fixed while the run is watched.
        let (context_tx, context) = watch::channel(initial.snapshot());
        let monitor = RunMonitor::new(Arc::clone(&self.backend), self.config.polling.interval())
            .spawn(context);
        let mut updates = monitor.run();
        let mut last_status = run.status;
        info!(run = run.id, interval_ms = self.config.polling.interval_ms, "Watching run");

        let result = loop {
            if updates.changed().await.is_err() {
                break Err(ConsoleError::Task("run monitor stopped".to_string()));
            }
            let Some(current) = updates.borrow_and_update().clone() else {
                debug!("Run not resolved yet");
                continue;
            };
            if current.status != last_status {
                last_status = current.status;
                writeln!(out, "{}", format_status_line(&current, self.color))?;
            }
            if !current.is_active() {
                break Ok(());
            }
        };

        monitor.stop();
        drop(context_tx);
        result
    }

    async fn events<W: Write>(&self, parent: LogParent, page: u32, out: &mut W) -> Result<(), ConsoleError> {
        let cache = PaginatedLogCache::new(
            Arc::clone(&self.backend),
            Some(parent.clone()),
            self.config.log_cache.page_size,
        );
        match cache.load_page(page).await? {
            PageEntry::Loaded(loaded) => {
                let total = cache.known_total_pages().unwrap_or(loaded.total_pages);
                writeln!(out, "{}", format_events_table(&parent, &loaded, total))?;
                Ok(())
            }
            _ => match cache.known_total_pages() {
                Some(total) if page > total => Err(LogCacheError::OutOfRange {
                    requested: page,
                    total,
                }
                .into()),
                _ => Err(ConsoleError::PageUnavailable {
                    page,
                    parent: parent.to_string(),
                }),
            },
        }
    }
}
