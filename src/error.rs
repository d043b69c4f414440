//! Error types for the console coordination core.

use thiserror::Error;

use crate::context::Level;

/// Failures reported by a backend fetch.
///
/// These are ordinary outcomes: components encode them as absent levels,
/// unloaded pages or skipped poll ticks instead of propagating them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Consistency bugs that cannot be recovered locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Log feed reported {reported} total pages after {expected} were recorded")]
    TotalPagesChanged { expected: u32, reported: u32 },

    #[error("Context level {level} is populated without its ancestors")]
    OrphanedLevel { level: Level },
}

/// Errors returned by the paginated log cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogCacheError {
    #[error("Invalid page index {0}: pages are numbered from 1")]
    InvalidPage(u32),

    #[error("Page {requested} is out of range: the feed has {total} pages")]
    OutOfRange { requested: u32, total: u32 },

    #[error("No log parent is selected")]
    NoParent,

    #[error("Log cache is inconsistent: {0}")]
    Inconsistent(#[from] InvariantViolation),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Log cache error: {0}")]
    LogCache(#[from] LogCacheError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Could not resolve {0}")]
    Unresolved(String),

    #[error("Page {page} of the {parent} audit log could not be loaded")]
    PageUnavailable { page: u32, parent: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for ConsoleError {
    fn from(err: config::ConfigError) -> Self {
        ConsoleError::ConfigError(err.to_string())
    }
}
