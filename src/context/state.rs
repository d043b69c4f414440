//! Resolver state machine.
//!
//! Turns parameter frames and fetch outcomes into fetch commands and a
//! [`ResolvedContext`]. Performs no I/O: the driver in `resolver` executes the
//! commands and feeds the outcomes back.
//!
//! Each level moves `Absent -> Resolving -> Resolved`, or
//! `Absent -> Resolving -> Failed` (which reads as absent). A failed level
//! stays failed across completions and is fetched again on the next frame,
//! even an identical one. A level whose key changes is cleared together with
//! every level below it before anything is fetched. Every fetch carries a generation; an outcome is applied only while
//! its level is still resolving that generation.

use tracing::{debug, warn};

use crate::context::types::{
    Entity, FetchCommand, FetchOutcome, Level, LevelKey, LevelPhase, ResolvedContext,
};
use crate::error::BackendError;
use crate::types::ParameterFrame;

#[derive(Debug, Clone)]
enum Slot {
    Absent,
    Resolving { key: LevelKey, generation: u64 },
    Resolved { key: LevelKey, entity: Entity },
    Failed { key: LevelKey, error: BackendError },
}

impl Slot {
    fn key(&self) -> Option<&LevelKey> {
        match self {
            Slot::Absent => None,
            Slot::Resolving { key, .. } | Slot::Resolved { key, .. } | Slot::Failed { key, .. } => {
                Some(key)
            }
        }
    }

    fn phase(&self) -> LevelPhase {
        match self {
            Slot::Absent => LevelPhase::Absent,
            Slot::Resolving { .. } => LevelPhase::Resolving,
            Slot::Resolved { .. } => LevelPhase::Resolved,
            Slot::Failed { .. } => LevelPhase::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverState {
    frame: ParameterFrame,
    slots: [Slot; 4],
    next_generation: u64,
}

impl Default for ResolverState {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverState {
    pub fn new() -> Self {
        Self {
            frame: ParameterFrame::default(),
            slots: [Slot::Absent, Slot::Absent, Slot::Absent, Slot::Absent],
            next_generation: 1,
        }
    }

    pub fn frame(&self) -> &ParameterFrame {
        &self.frame
    }

    pub fn phase(&self, level: Level) -> LevelPhase {
        self.slots[level.index()].phase()
    }

    /// True when no fetch is outstanding.
    pub fn is_settled(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|slot| matches!(slot, Slot::Resolving { .. }))
    }

    /// The failure currently clearing a level, if any.
    pub fn failure(&self) -> Option<(Level, &BackendError)> {
        Level::ALL
            .into_iter()
            .find_map(|level| match &self.slots[level.index()] {
                Slot::Failed { error, .. } => Some((level, error)),
                _ => None,
            })
    }

    /// Handle a new parameter frame. Failed levels are retried.
    pub fn apply_frame(&mut self, frame: ParameterFrame) -> Vec<FetchCommand> {
        if frame != self.frame {
            debug!(?frame, "Parameter frame changed");
        }
        self.frame = frame;
        for slot in &mut self.slots {
            if matches!(slot, Slot::Failed { .. }) {
                *slot = Slot::Absent;
            }
        }
        self.reconcile()
    }

    /// Handle a finished fetch. Outcomes for superseded generations are dropped.
    pub fn complete(&mut self, outcome: FetchOutcome) -> Vec<FetchCommand> {
        let FetchOutcome {
            generation,
            level,
            result,
        } = outcome;
        let slot = &mut self.slots[level.index()];
        let key = match slot {
            Slot::Resolving {
                key,
                generation: current,
            } if *current == generation => key.clone(),
            _ => {
                debug!(%level, generation, "Discarding stale fetch result");
                return Vec::new();
            }
        };

        *slot = match result {
            Ok(entity) if entity.level() == level => {
                debug!(%level, generation, "Level resolved");
                Slot::Resolved { key, entity }
            }
            Ok(entity) => {
                let error = BackendError::Decode(format!(
                    "expected a {} but received a {}",
                    level,
                    entity.level()
                ));
                warn!(%level, error = %error, "Level resolution returned the wrong entity");
                Slot::Failed { key, error }
            }
            Err(error) => {
                warn!(%level, error = %error, "Failed to resolve level");
                Slot::Failed { key, error }
            }
        };

        self.reconcile()
    }

    /// Reset every level to absent, e.g. when the consumer detaches.
    pub fn reset(&mut self) {
        self.frame = ParameterFrame::default();
        self.clear_from(Level::Project);
    }

    pub fn snapshot(&self) -> ResolvedContext {
        let mut context = ResolvedContext::default();
        for slot in &self.slots {
            if let Slot::Resolved { entity, .. } = slot {
                match entity.clone() {
                    Entity::Project(project) => context.project = Some(project),
                    Entity::Model(model) => context.model = Some(model),
                    Entity::Pipeline(pipeline) => context.pipeline = Some(pipeline),
                    Entity::Run(run) => context.run = Some(run),
                }
            }
        }
        context
    }

    fn clear_from(&mut self, level: Level) {
        for slot in &mut self.slots[level.index()..] {
            *slot = Slot::Absent;
        }
    }

    fn parent_resolved(&self, level: Level) -> bool {
        match level.parent() {
            None => true,
            Some(parent) => matches!(self.slots[parent.index()], Slot::Resolved { .. }),
        }
    }

    fn reconcile(&mut self) -> Vec<FetchCommand> {
        let mut commands = Vec::new();
        for level in Level::ALL {
            let desired = LevelKey::from_frame(level, &self.frame);
            if self.slots[level.index()].key() != desired.as_ref() {
                self.clear_from(level);
            }

            let Some(key) = desired else {
                continue;
            };
            if matches!(self.slots[level.index()], Slot::Absent) && self.parent_resolved(level) {
                let generation = self.next_generation;
                self.next_generation += 1;
                debug!(%level, generation, "Issuing fetch");
                self.slots[level.index()] = Slot::Resolving {
                    key: key.clone(),
                    generation,
                };
                commands.push(FetchCommand { generation, key });
            }
        }
        commands
    }
}
