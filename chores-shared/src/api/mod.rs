use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::{Recurrence, SourceType};

pub mod endpoints;
#[cfg(feature = "rest-client")]
pub mod rest;

pub const API_V1_PREFIX: &str = "/api/v1";

pub fn admin_scope() -> String {
    format!("{}/admin", API_V1_PREFIX)
}

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeDto {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

// Chores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreDto {
    pub id: i32,
    pub name: String,
    pub default_points: i32,
    pub image: Option<String>,
    pub created: String,  // RFC3339 UTC
    pub modified: String, // RFC3339 UTC
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreReq {
    pub name: String,
    pub default_points: i32,
    #[serde(default)]
    pub image: Option<String>,
}

// Blueprints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintDto {
    pub id: i32,
    pub name: String,
    pub to_be_completed_by: String,
    pub allow_multiple_instances_per_day: bool,
    pub recurrence: Recurrence,
    pub image: Option<String>,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintChoreDto {
    pub chore_id: i32,
    pub name: String,
    pub default_points: i32,
    /// Per-assignment override; falls back to the chore image when absent.
    pub image: Option<String>,
    pub chore_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintDetailDto {
    #[serde(flatten)]
    pub blueprint: BlueprintDto,
    pub chores: Vec<BlueprintChoreDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintChoreReq {
    pub chore_id: i32,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintReq {
    pub name: String,
    #[serde(default)]
    pub to_be_completed_by: String,
    #[serde(default)]
    pub allow_multiple_instances_per_day: bool,
    pub recurrence: Recurrence,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub chores: Vec<BlueprintChoreReq>,
}

// Routines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineDto {
    pub id: i32,
    pub owner_id: i32,
    pub blueprint_id: Option<i32>,
    pub image: Option<String>,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoutineReq {
    pub owner_id: i32,
    #[serde(default)]
    pub blueprint_id: Option<i32>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayableRoutineDto {
    /// Negative (`-blueprint_id`) for blueprint-sourced entries.
    pub id: i32,
    pub name: String,
    pub to_be_completed_by: String,
    pub image: Option<String>,
    pub owner_id: i32,
    pub source_type: SourceType,
    pub blueprint_id: i32,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub chore_count: i64,
    pub completed_chores: i64,
    pub is_complete: bool,
    pub completion_percentage: i64,
}

// Chore completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineChoreDto {
    /// Absent while the chore has not been started.
    pub id: Option<i32>,
    pub routine_id: i32,
    pub chore_id: i32,
    pub name: String,
    pub image: Option<String>,
    pub points_awarded: i32,
    pub completed_at: Option<String>, // RFC3339 UTC
    pub completed_by: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreCompletionReq {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreCompletionResp {
    pub chore_routine: RoutineChoreDto,
}
