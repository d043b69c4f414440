//! Context domain: derives the nested project/model/pipeline/run context from
//! navigation parameters. `state` owns the transitions; `resolver` drives them
//! against a backend and publishes snapshots.

pub mod resolver;
pub mod state;
pub mod types;

pub use resolver::{fetch_level, resolve_frame, ContextResolver, ResolverHandle};
pub use state::ResolverState;
pub use types::{
    Entity, FetchCommand, FetchOutcome, Level, LevelKey, LevelPhase, ResolvedContext,
};
