//! Admin CRUD over chores, blueprints and routine instances. Role checks
//! happen in the ACL middleware.

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chores_shared::api;
use chores_shared::domain::Recurrence;

use super::{AppError, AppState, dto};
use crate::routines::non_empty;
use crate::storage::models::{BlueprintChoreSpec, BlueprintFields, ChoreFields, RoutineBlueprint};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "svg"];

fn deleted_or_not_found(deleted: bool, entity: &str, id: i32) -> Result<StatusCode, AppError> {
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("{entity} not found: {id}")))
    }
}

fn chore_fields(body: api::ChoreReq) -> ChoreFields {
    ChoreFields {
        name: body.name.trim().to_string(),
        default_points: body.default_points,
        image: non_empty(body.image.as_deref()).map(str::to_string),
    }
}

pub(super) async fn list_chores(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::ChoreDto>>, AppError> {
    let rows = state.store.list_chores().await?;
    Ok(Json(rows.iter().map(dto::chore).collect()))
}

pub(super) async fn get_chore(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<api::ChoreDto>, AppError> {
    let chore = state
        .store
        .get_chore(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("chore not found: {id}")))?;
    Ok(Json(dto::chore(&chore)))
}

pub(super) async fn create_chore(
    State(state): State<AppState>,
    Json(body): Json<api::ChoreReq>,
) -> Result<(StatusCode, Json<api::ChoreDto>), AppError> {
    let chore = state.store.create_chore(chore_fields(body)).await?;
    tracing::info!(chore_id = chore.id, name = %chore.name, "chore created");
    Ok((StatusCode::CREATED, Json(dto::chore(&chore))))
}

pub(super) async fn update_chore(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<api::ChoreReq>,
) -> Result<Json<api::ChoreDto>, AppError> {
    let chore = state.store.update_chore(id, chore_fields(body)).await?;
    Ok(Json(dto::chore(&chore)))
}

pub(super) async fn delete_chore(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = state.store.delete_chore(id).await?;
    deleted_or_not_found(deleted, "chore", id)
}

fn blueprint_input(body: api::BlueprintReq) -> (BlueprintFields, Vec<BlueprintChoreSpec>) {
    let fields = BlueprintFields {
        name: body.name.trim().to_string(),
        to_be_completed_by: body.to_be_completed_by.trim().to_string(),
        allow_multiple_instances_per_day: body.allow_multiple_instances_per_day,
        recurrence: body.recurrence,
        image: non_empty(body.image.as_deref()).map(str::to_string),
    };
    let chores = body
        .chores
        .into_iter()
        .map(|c| BlueprintChoreSpec {
            chore_id: c.chore_id,
            image: non_empty(c.image.as_deref()).map(str::to_string),
        })
        .collect();
    (fields, chores)
}

fn blueprint_recurrence(bp: &RoutineBlueprint) -> Result<Recurrence, AppError> {
    bp.recurrence().map_err(|e| {
        AppError::internal(format!("blueprint {} has bad recurrence: {e}", bp.id))
    })
}

async fn blueprint_detail(
    state: &AppState,
    bp: &RoutineBlueprint,
) -> Result<api::BlueprintDetailDto, AppError> {
    let chores = state.store.list_blueprint_chores(bp.id).await?;
    Ok(api::BlueprintDetailDto {
        blueprint: dto::blueprint(bp, blueprint_recurrence(bp)?),
        chores: chores.iter().map(dto::blueprint_chore).collect(),
    })
}

pub(super) async fn list_blueprints(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::BlueprintDto>>, AppError> {
    let rows = state.store.list_blueprints().await?;
    let mut out = Vec::with_capacity(rows.len());
    for bp in &rows {
        match bp.recurrence() {
            Ok(r) => out.push(dto::blueprint(bp, r)),
            Err(e) => tracing::warn!(blueprint_id = bp.id, error = %e, "skipping blueprint"),
        }
    }
    Ok(Json(out))
}

pub(super) async fn get_blueprint(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<api::BlueprintDetailDto>, AppError> {
    let bp = state
        .store
        .get_blueprint(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("blueprint not found: {id}")))?;
    Ok(Json(blueprint_detail(&state, &bp).await?))
}

pub(super) async fn create_blueprint(
    State(state): State<AppState>,
    Json(body): Json<api::BlueprintReq>,
) -> Result<(StatusCode, Json<api::BlueprintDetailDto>), AppError> {
    let (fields, chores) = blueprint_input(body);
    let bp = state.store.create_blueprint(fields, chores).await?;
    tracing::info!(blueprint_id = bp.id, name = %bp.name, "blueprint created");
    Ok((StatusCode::CREATED, Json(blueprint_detail(&state, &bp).await?)))
}

pub(super) async fn update_blueprint(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<api::BlueprintReq>,
) -> Result<Json<api::BlueprintDetailDto>, AppError> {
    let (fields, chores) = blueprint_input(body);
    let bp = state.store.update_blueprint(id, fields, chores).await?;
    Ok(Json(blueprint_detail(&state, &bp).await?))
}

pub(super) async fn delete_blueprint(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = state.store.delete_blueprint(id).await?;
    deleted_or_not_found(deleted, "blueprint", id)
}

pub(super) async fn list_routines(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::RoutineDto>>, AppError> {
    let rows = state.store.list_routines().await?;
    Ok(Json(rows.iter().map(dto::routine).collect()))
}

/// Creates a bare routine instance. Its blueprint chores show up as pending
/// until completed; use the blueprint start endpoint to seed records.
pub(super) async fn create_routine(
    State(state): State<AppState>,
    Json(body): Json<api::CreateRoutineReq>,
) -> Result<(StatusCode, Json<api::RoutineDto>), AppError> {
    if state.store.get_user(body.owner_id).await?.is_none() {
        return Err(AppError::not_found(format!("user not found: {}", body.owner_id)));
    }
    if let Some(bp_id) = body.blueprint_id
        && state.store.get_blueprint(bp_id).await?.is_none()
    {
        return Err(AppError::not_found(format!("blueprint not found: {bp_id}")));
    }
    let routine = state
        .store
        .create_routine(
            body.owner_id,
            body.blueprint_id,
            non_empty(body.image.as_deref()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dto::routine(&routine))))
}

pub(super) async fn delete_routine(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = state.store.delete_routine(id).await?;
    deleted_or_not_found(deleted, "routine", id)
}

/// File names of the images under `<static_dir>/img`, sorted.
pub(super) async fn list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let Some(dir) = state.config.static_dir.as_ref().map(|d| d.join("img")) else {
        return Ok(Json(Vec::new()));
    };
    let names = tokio::task::spawn_blocking(move || read_image_names(dir))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    Ok(Json(names))
}

fn read_image_names(dir: PathBuf) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "image directory missing");
            return Ok(names);
        }
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image && let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
