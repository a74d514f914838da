use crate::storage::schema::{
    chore_routines, chores, routine_blueprint_chores, routine_blueprints, routines, sessions,
    users,
};
use chores_shared::domain::{Recurrence, UnknownRecurrence};
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub created: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(jti))]
pub struct Session {
    pub jti: String,
    pub user_id: i32,
    pub issued_at: NaiveDateTime,
    pub last_used_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub user_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = chores)]
pub struct Chore {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub name: String,
    pub default_points: i32,
    pub image: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = chores)]
pub struct NewChore<'a> {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub name: &'a str,
    pub default_points: i32,
    pub image: Option<&'a str>,
}

/// Content fields of a chore, as edited by an admin.
#[derive(Debug, Clone)]
pub struct ChoreFields {
    pub name: String,
    pub default_points: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = routine_blueprints)]
pub struct RoutineBlueprint {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub name: String,
    pub to_be_completed_by: String,
    pub allow_multiple_instances_per_day: bool,
    pub recurrence: String,
    pub image: Option<String>,
}

impl RoutineBlueprint {
    pub fn recurrence(&self) -> Result<Recurrence, UnknownRecurrence> {
        self.recurrence.parse()
    }
}

#[derive(Insertable)]
#[diesel(table_name = routine_blueprints)]
pub struct NewRoutineBlueprint<'a> {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub name: &'a str,
    pub to_be_completed_by: &'a str,
    pub allow_multiple_instances_per_day: bool,
    pub recurrence: &'a str,
    pub image: Option<&'a str>,
}

/// Content fields of a blueprint, as edited by an admin.
#[derive(Debug, Clone)]
pub struct BlueprintFields {
    pub name: String,
    pub to_be_completed_by: String,
    pub allow_multiple_instances_per_day: bool,
    pub recurrence: Recurrence,
    pub image: Option<String>,
}

/// One chore assignment of a blueprint, with optional image override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintChoreSpec {
    pub chore_id: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = routine_blueprint_chores)]
#[diesel(belongs_to(RoutineBlueprint, foreign_key = routine_blueprint_id))]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
pub struct RoutineBlueprintChore {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub routine_blueprint_id: i32,
    pub chore_id: i32,
    pub image: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = routine_blueprint_chores)]
pub struct NewRoutineBlueprintChore<'a> {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub routine_blueprint_id: i32,
    pub chore_id: i32,
    pub image: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = routines)]
pub struct Routine {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub owner_id: i32,
    pub routine_blueprint_id: Option<i32>,
    pub image: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = routines)]
pub struct NewRoutine<'a> {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub owner_id: i32,
    pub routine_blueprint_id: Option<i32>,
    pub image: Option<&'a str>,
}

/// Raw completion record row. Use `routines::chores::CompletionRecord` outside
/// of storage; it guarantees the completed-at / completed-by pairing.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chore_routines)]
#[diesel(belongs_to(Routine, foreign_key = routine_id))]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
pub struct ChoreRoutine {
    pub id: i32,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<i32>,
    pub points_awarded: i32,
    pub routine_id: i32,
    pub chore_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = chore_routines)]
pub struct NewChoreRoutine {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<i32>,
    pub points_awarded: i32,
    pub routine_id: i32,
    pub chore_id: i32,
}

/// Total and completed chores of one routine instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChoreCounts {
    pub total: i64,
    pub completed: i64,
}
