//! What a user should see today: their routine instances plus virtual
//! routines for blueprints that apply today and have no instance yet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chores_shared::domain::{Recurrence, SourceType};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::{debug, warn};

use super::chores::ChoreService;
use super::priority::time_of_day_priority;
use super::{CoreError, non_empty};
use crate::storage::{StorageError, Store};
use crate::storage::models::{Chore, ChoreCounts, Routine, RoutineBlueprint, RoutineBlueprintChore};

/// A routine as presented to a user: either a stored instance together with
/// the blueprint it came from, or a virtual entry built from a blueprint
/// alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayableRoutine {
    Concrete {
        routine: Routine,
        blueprint: RoutineBlueprint,
        counts: ChoreCounts,
    },
    Virtual {
        blueprint: RoutineBlueprint,
        owner_id: i32,
        chore_count: i64,
        /// First blueprint chore's image: the override, else the chore's own.
        first_chore_image: Option<String>,
    },
}

impl DisplayableRoutine {
    /// Routine id for concrete entries; `-blueprint_id` for virtual ones.
    /// Branch on [`Self::source_type`] before using it as a key.
    pub fn id(&self) -> i32 {
        match self {
            DisplayableRoutine::Concrete { routine, .. } => routine.id,
            DisplayableRoutine::Virtual { blueprint, .. } => -blueprint.id,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            DisplayableRoutine::Concrete { .. } => SourceType::Database,
            DisplayableRoutine::Virtual { .. } => SourceType::Blueprint,
        }
    }

    pub fn blueprint(&self) -> &RoutineBlueprint {
        match self {
            DisplayableRoutine::Concrete { blueprint, .. }
            | DisplayableRoutine::Virtual { blueprint, .. } => blueprint,
        }
    }

    pub fn blueprint_id(&self) -> i32 {
        self.blueprint().id
    }

    pub fn name(&self) -> &str {
        &self.blueprint().name
    }

    pub fn to_be_completed_by(&self) -> &str {
        &self.blueprint().to_be_completed_by
    }

    pub fn owner_id(&self) -> i32 {
        match self {
            DisplayableRoutine::Concrete { routine, .. } => routine.owner_id,
            DisplayableRoutine::Virtual { owner_id, .. } => *owner_id,
        }
    }

    /// Concrete: the routine's image, else the blueprint's. Virtual: the
    /// blueprint's, else the first blueprint chore's.
    pub fn image(&self) -> Option<&str> {
        match self {
            DisplayableRoutine::Concrete {
                routine, blueprint, ..
            } => non_empty(routine.image.as_deref()).or(non_empty(blueprint.image.as_deref())),
            DisplayableRoutine::Virtual {
                blueprint,
                first_chore_image,
                ..
            } => non_empty(blueprint.image.as_deref()).or(non_empty(first_chore_image.as_deref())),
        }
    }

    pub fn created(&self) -> Option<NaiveDateTime> {
        match self {
            DisplayableRoutine::Concrete { routine, .. } => Some(routine.created),
            DisplayableRoutine::Virtual { .. } => None,
        }
    }

    pub fn modified(&self) -> Option<NaiveDateTime> {
        match self {
            DisplayableRoutine::Concrete { routine, .. } => Some(routine.modified),
            DisplayableRoutine::Virtual { .. } => None,
        }
    }

    pub fn chore_count(&self) -> i64 {
        match self {
            DisplayableRoutine::Concrete { counts, .. } => counts.total,
            DisplayableRoutine::Virtual { chore_count, .. } => *chore_count,
        }
    }

    /// Always 0 for virtual entries.
    pub fn completed_chores(&self) -> i64 {
        match self {
            DisplayableRoutine::Concrete { counts, .. } => counts.completed,
            DisplayableRoutine::Virtual { .. } => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.chore_count() > 0 && self.completed_chores() == self.chore_count()
    }

    /// 0..=100, rounded down; 0 when there are no chores.
    pub fn completion_percentage(&self) -> i64 {
        match self.chore_count() {
            0 => 0,
            total => self.completed_chores() * 100 / total,
        }
    }
}

/// Whether a blueprint with this recurrence produces a routine on `weekday`.
pub fn applies_on(recurrence: Recurrence, weekday: Weekday) -> bool {
    match recurrence {
        Recurrence::Daily => true,
        Recurrence::Weekday => weekday.number_from_monday() <= 5,
        // TODO: match a target weekday once blueprints store one.
        Recurrence::Weekly => true,
    }
}

/// Stable sort by deadline priority; equal priorities keep their order.
pub fn sort_by_deadline(routines: &mut [DisplayableRoutine]) {
    routines.sort_by_cached_key(|r| time_of_day_priority(r.to_be_completed_by()));
}

/// Completed and total chores of one routine instance.
#[async_trait]
pub trait ChoreCountSource: Send + Sync {
    async fn chore_counts(&self, routine_id: i32) -> Result<ChoreCounts, StorageError>;
}

#[async_trait]
impl ChoreCountSource for Store {
    async fn chore_counts(&self, routine_id: i32) -> Result<ChoreCounts, StorageError> {
        self.chore_counts_for_routine(routine_id).await
    }
}

#[derive(Clone)]
pub struct RoutineService {
    store: Store,
    chores: ChoreService,
    counts: Arc<dyn ChoreCountSource>,
}

impl RoutineService {
    pub fn new(store: Store) -> Self {
        let counts = Arc::new(store.clone());
        Self::with_counts(store, counts)
    }

    /// Same as [`Self::new`] with chore counts taken from `counts`.
    pub fn with_counts(store: Store, counts: Arc<dyn ChoreCountSource>) -> Self {
        Self {
            chores: ChoreService::new(store.clone()),
            store,
            counts,
        }
    }

    pub fn chores(&self) -> &ChoreService {
        &self.chores
    }

    /// Routines to show `user_id` on `today`, ordered by deadline.
    ///
    /// Every blueprint-linked routine instance of the user is listed (no date
    /// filtering yet); instances without a blueprint are left out. Blueprints
    /// with an instance are not listed again. A failing chore count only
    /// zeroes that routine's counts.
    pub async fn relevant_routines(
        &self,
        user_id: i32,
        today: NaiveDate,
    ) -> Result<Vec<DisplayableRoutine>, CoreError> {
        let routines = self.store.list_routines_for_owner(user_id).await?;
        let blueprints = self.store.list_blueprints().await?;
        let by_id: HashMap<i32, &RoutineBlueprint> =
            blueprints.iter().map(|bp| (bp.id, bp)).collect();

        let mut out = Vec::new();
        let mut represented = HashSet::new();

        for routine in routines {
            let Some(blueprint_id) = routine.routine_blueprint_id else {
                continue;
            };
            let Some(blueprint) = by_id.get(&blueprint_id) else {
                warn!(
                    routine_id = routine.id,
                    blueprint_id, "routine links to a missing blueprint"
                );
                continue;
            };
            let counts = match self.counts.chore_counts(routine.id).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(routine_id = routine.id, error = %e, "counting chores failed");
                    ChoreCounts::default()
                }
            };
            represented.insert(blueprint_id);
            out.push(DisplayableRoutine::Concrete {
                routine,
                blueprint: (*blueprint).clone(),
                counts,
            });
        }
        let concrete = out.len();

        let weekday = today.weekday();
        for blueprint in &blueprints {
            if represented.contains(&blueprint.id) {
                continue;
            }
            let recurrence = match blueprint.recurrence() {
                Ok(r) => r,
                Err(e) => {
                    warn!(blueprint_id = blueprint.id, error = %e, "skipping blueprint");
                    continue;
                }
            };
            if !applies_on(recurrence, weekday) {
                continue;
            }
            let chores = self.store.list_blueprint_chores(blueprint.id).await?;
            let distinct: HashSet<i32> = chores.iter().map(|(a, _)| a.chore_id).collect();
            out.push(DisplayableRoutine::Virtual {
                blueprint: blueprint.clone(),
                owner_id: user_id,
                chore_count: distinct.len() as i64,
                first_chore_image: chores.first().and_then(first_chore_image),
            });
        }

        debug!(
            user_id,
            %today,
            concrete,
            virtual_count = out.len() - concrete,
            "relevant routines"
        );
        sort_by_deadline(&mut out);
        Ok(out)
    }

    /// Materializes a blueprint for a user: a new routine linked to it, with a
    /// not-completed record for each of its chores.
    pub async fn start_from_blueprint(
        &self,
        blueprint_id: i32,
        user_id: i32,
    ) -> Result<Routine, CoreError> {
        let blueprint =
            self.store
                .get_blueprint(blueprint_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "blueprint",
                    id: blueprint_id,
                })?;
        let routine = self
            .store
            .create_routine(
                user_id,
                Some(blueprint.id),
                non_empty(blueprint.image.as_deref()),
            )
            .await?;
        let seeded = self
            .chores
            .seed_from_blueprint(routine.id, blueprint.id, user_id)
            .await?;
        debug!(routine_id = routine.id, blueprint_id, seeded, "routine started");
        Ok(routine)
    }
}

fn first_chore_image((assignment, chore): &(RoutineBlueprintChore, Chore)) -> Option<String> {
    non_empty(assignment.image.as_deref())
        .or(non_empty(chore.image.as_deref()))
        .map(str::to_string)
}
