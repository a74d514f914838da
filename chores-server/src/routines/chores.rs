//! Chore reconciliation: the chores a routine instance should show, merging
//! persisted completion records with not-yet-started chores from the
//! routine's blueprint.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::CoreError;
use crate::storage::Store;
use crate::storage::models::{Chore, ChoreRoutine};

/// When and by whom a chore instance was completed. The two always travel
/// together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub at: NaiveDateTime,
    pub by: i32,
}

/// A persisted completion record with a validated completion pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub completion: Option<Completion>,
    pub points_awarded: i32,
    pub routine_id: i32,
    pub chore_id: i32,
}

impl TryFrom<ChoreRoutine> for CompletionRecord {
    type Error = CoreError;

    fn try_from(row: ChoreRoutine) -> Result<Self, Self::Error> {
        let completion = match (row.completed_at, row.completed_by) {
            (Some(at), Some(by)) => Some(Completion { at, by }),
            (None, None) => None,
            (at, by) => {
                return Err(CoreError::InvalidState(format!(
                    "chore_routine {} has completed_at={:?} but completed_by={:?}",
                    row.id, at, by
                )));
            }
        };
        Ok(CompletionRecord {
            id: row.id,
            created: row.created,
            modified: row.modified,
            completion,
            points_awarded: row.points_awarded,
            routine_id: row.routine_id,
            chore_id: row.chore_id,
        })
    }
}

/// One chore of a routine instance, either backed by a stored record or
/// pending (derived from the blueprint, never stored).
///
/// Only [`ChoreService::upsert_completion`] writes records, and it takes ids,
/// so a pending entry has no path into storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineChore {
    Recorded { record: CompletionRecord, chore: Chore },
    Pending { routine_id: i32, chore: Chore },
}

impl RoutineChore {
    /// Record id; `None` for pending entries.
    pub fn id(&self) -> Option<i32> {
        match self {
            RoutineChore::Recorded { record, .. } => Some(record.id),
            RoutineChore::Pending { .. } => None,
        }
    }

    pub fn routine_id(&self) -> i32 {
        match self {
            RoutineChore::Recorded { record, .. } => record.routine_id,
            RoutineChore::Pending { routine_id, .. } => *routine_id,
        }
    }

    pub fn chore(&self) -> &Chore {
        match self {
            RoutineChore::Recorded { chore, .. } | RoutineChore::Pending { chore, .. } => chore,
        }
    }

    pub fn chore_id(&self) -> i32 {
        match self {
            RoutineChore::Recorded { record, .. } => record.chore_id,
            RoutineChore::Pending { chore, .. } => chore.id,
        }
    }

    /// Points captured when the record was created; pending entries show the
    /// chore's current default.
    pub fn points_awarded(&self) -> i32 {
        match self {
            RoutineChore::Recorded { record, .. } => record.points_awarded,
            RoutineChore::Pending { chore, .. } => chore.default_points,
        }
    }

    pub fn completion(&self) -> Option<Completion> {
        match self {
            RoutineChore::Recorded { record, .. } => record.completion,
            RoutineChore::Pending { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completion().is_some()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RoutineChore::Pending { .. })
    }
}

#[derive(Clone)]
pub struct ChoreService {
    store: Store,
}

impl ChoreService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Chores of one routine instance: stored records first (insertion
    /// order), then a pending entry for every blueprint chore without a
    /// record (blueprint order). Routines without a blueprint get their
    /// records only.
    pub async fn reconcile(&self, routine_id: i32) -> Result<Vec<RoutineChore>, CoreError> {
        let blueprint_id = self.store.routine_blueprint_id(routine_id).await?;

        let mut out = self
            .store
            .list_chore_routines_with_chores(routine_id)
            .await?
            .into_iter()
            .map(|(row, chore)| -> Result<RoutineChore, CoreError> {
                Ok(RoutineChore::Recorded {
                    record: CompletionRecord::try_from(row)?,
                    chore,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(blueprint_id) = blueprint_id else {
            return Ok(out);
        };

        // A blueprint listing the same chore twice still yields one entry.
        let mut present: HashSet<i32> = out.iter().map(RoutineChore::chore_id).collect();
        let blueprint_chores = self.store.list_blueprint_chores(blueprint_id).await?;
        let recorded = out.len();
        out.extend(
            blueprint_chores
                .into_iter()
                .filter(|(assignment, _)| present.insert(assignment.chore_id))
                .map(|(_, chore)| RoutineChore::Pending { routine_id, chore }),
        );
        debug!(
            routine_id,
            blueprint_id,
            recorded,
            pending = out.len() - recorded,
            "reconciled routine chores"
        );
        Ok(out)
    }

    /// Marks a chore of a routine completed or not completed. Repeating the
    /// current state writes nothing and returns the stored record, together
    /// with the chore it refers to.
    pub async fn upsert_completion(
        &self,
        routine_id: i32,
        chore_id: i32,
        completed: bool,
        acting_user: i32,
    ) -> Result<(CompletionRecord, Chore), CoreError> {
        let (row, chore) = self
            .store
            .upsert_chore_routine(routine_id, chore_id, completed, acting_user)
            .await?;
        Ok((CompletionRecord::try_from(row)?, chore))
    }

    /// Creates a completion record (not completed) for every chore of the
    /// blueprint a routine was created from. Failing rows are logged and
    /// skipped.
    pub(crate) async fn seed_from_blueprint(
        &self,
        routine_id: i32,
        blueprint_id: i32,
        acting_user: i32,
    ) -> Result<usize, CoreError> {
        let blueprint_chores = self.store.list_blueprint_chores(blueprint_id).await?;
        let mut created = 0;
        for (assignment, _) in blueprint_chores {
            match self
                .upsert_completion(routine_id, assignment.chore_id, false, acting_user)
                .await
            {
                Ok(_) => created += 1,
                Err(e) => warn!(
                    routine_id,
                    chore_id = assignment.chore_id,
                    error = %e,
                    "failed to create chore record for new routine"
                ),
            }
        }
        Ok(created)
    }
}
