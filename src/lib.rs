//! Collab Console: client-side coordination core for a collaboration server
//!
//! Resolves a hierarchy of route parameters (project, model, pipeline, run)
//! into entities fetched from the server, polls in-progress pipeline runs
//! until they finish, and caches an entity's paginated audit log page by page.

pub mod audit_log;
pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod poller;
pub mod types;
