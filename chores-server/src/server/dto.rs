//! Row and view types to wire DTOs.

use chores_shared::api;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::routines::{CompletionRecord, DisplayableRoutine, RoutineChore};
use crate::storage::models::{Chore, Routine, RoutineBlueprint, RoutineBlueprintChore};

/// Stored timestamps are naive UTC.
pub(super) fn rfc3339(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(super) fn chore(c: &Chore) -> api::ChoreDto {
    api::ChoreDto {
        id: c.id,
        name: c.name.clone(),
        default_points: c.default_points,
        image: c.image.clone(),
        created: rfc3339(c.created),
        modified: rfc3339(c.modified),
    }
}

/// Blueprints whose stored recurrence no longer parses are rejected by the
/// caller before this point.
pub(super) fn blueprint(
    bp: &RoutineBlueprint,
    recurrence: chores_shared::domain::Recurrence,
) -> api::BlueprintDto {
    api::BlueprintDto {
        id: bp.id,
        name: bp.name.clone(),
        to_be_completed_by: bp.to_be_completed_by.clone(),
        allow_multiple_instances_per_day: bp.allow_multiple_instances_per_day,
        recurrence,
        image: bp.image.clone(),
        created: rfc3339(bp.created),
        modified: rfc3339(bp.modified),
    }
}

pub(super) fn blueprint_chore(
    (assignment, chore): &(RoutineBlueprintChore, Chore),
) -> api::BlueprintChoreDto {
    api::BlueprintChoreDto {
        chore_id: assignment.chore_id,
        name: chore.name.clone(),
        default_points: chore.default_points,
        image: assignment.image.clone(),
        chore_image: chore.image.clone(),
    }
}

pub(super) fn routine(r: &Routine) -> api::RoutineDto {
    api::RoutineDto {
        id: r.id,
        owner_id: r.owner_id,
        blueprint_id: r.routine_blueprint_id,
        image: r.image.clone(),
        created: rfc3339(r.created),
        modified: rfc3339(r.modified),
    }
}

pub(super) fn displayable_routine(r: &DisplayableRoutine) -> api::DisplayableRoutineDto {
    api::DisplayableRoutineDto {
        id: r.id(),
        name: r.name().to_string(),
        to_be_completed_by: r.to_be_completed_by().to_string(),
        image: r.image().map(str::to_string),
        owner_id: r.owner_id(),
        source_type: r.source_type(),
        blueprint_id: r.blueprint_id(),
        created: r.created().map(rfc3339),
        modified: r.modified().map(rfc3339),
        chore_count: r.chore_count(),
        completed_chores: r.completed_chores(),
        is_complete: r.is_complete(),
        completion_percentage: r.completion_percentage(),
    }
}

pub(super) fn routine_chore(rc: &RoutineChore) -> api::RoutineChoreDto {
    let completion = rc.completion();
    api::RoutineChoreDto {
        id: rc.id(),
        routine_id: rc.routine_id(),
        chore_id: rc.chore_id(),
        name: rc.chore().name.clone(),
        image: rc.chore().image.clone(),
        points_awarded: rc.points_awarded(),
        completed_at: completion.map(|c| rfc3339(c.at)),
        completed_by: completion.map(|c| c.by),
    }
}

pub(super) fn completion_record(
    record: &CompletionRecord,
    chore: &Chore,
) -> api::RoutineChoreDto {
    api::RoutineChoreDto {
        id: Some(record.id),
        routine_id: record.routine_id,
        chore_id: record.chore_id,
        name: chore.name.clone(),
        image: chore.image.clone(),
        points_awarded: record.points_awarded,
        completed_at: record.completion.map(|c| rfc3339(c.at)),
        completed_by: record.completion.map(|c| c.by),
    }
}
