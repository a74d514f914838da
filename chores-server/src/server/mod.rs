mod acl;
mod admin;
pub mod auth;
mod config;
mod dto;

use std::sync::Arc;

use crate::routines::{CoreError, RoutineService};
use crate::server::auth::{AuthCtx, SessionStore};
use crate::storage::models::Routine;
use crate::storage::{StorageError, Store};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use bcrypt::verify;
use chores_shared::api;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
pub use config::{AppConfig, ConfigError, DEFAULT_LISTEN_PORT, UserConfig};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub sessions: Arc<dyn SessionStore>,
    pub routines: RoutineService,
    tz: Tz,
    shutdown: CancellationToken,
}

impl AppState {
    /// Sessions are kept in `store`.
    pub fn new(config: AppConfig, store: Store) -> Result<Self, ConfigError> {
        let sessions: Arc<dyn SessionStore> = Arc::new(store.clone());
        Self::with_sessions(config, store, sessions)
    }

    pub fn with_sessions(
        config: AppConfig,
        store: Store,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        let tz = config.tz()?;
        Ok(Self {
            config: Arc::new(config),
            routines: RoutineService::new(store.clone()),
            store,
            sessions,
            tz,
            shutdown: CancellationToken::new(),
        })
    }

    /// Upserts the configured accounts so each has a stable user id.
    pub async fn seed_users(&self) -> Result<(), StorageError> {
        let accounts: Vec<_> = self
            .config
            .users
            .iter()
            .map(|u| (u.username.clone(), u.role))
            .collect();
        self.store.seed_users(&accounts).await
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The household's current date.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/chores",
            get(admin::list_chores).post(admin::create_chore),
        )
        .route(
            "/chores/{id}",
            get(admin::get_chore)
                .put(admin::update_chore)
                .delete(admin::delete_chore),
        )
        .route(
            "/blueprints",
            get(admin::list_blueprints).post(admin::create_blueprint),
        )
        .route(
            "/blueprints/{id}",
            get(admin::get_blueprint)
                .put(admin::update_blueprint)
                .delete(admin::delete_blueprint),
        )
        .route(
            "/routines",
            get(admin::list_routines).post(admin::create_routine),
        )
        .route("/routines/{id}", axum::routing::delete(admin::delete_routine))
        .route("/images", get(admin::list_images));

    let private = Router::new()
        .route("/api/v1/auth/logout", post(api_auth_logout))
        .route("/api/v1/me", get(api_me))
        .route("/api/v1/routines/relevant", get(api_relevant_routines))
        .route("/api/v1/routines/{id}/chores", get(api_routine_chores))
        .route(
            "/api/v1/routines/{id}/chores/{chore_id}",
            post(api_set_chore_completion),
        )
        .route("/api/v1/blueprints/{id}/start", post(api_start_blueprint))
        .nest(&api::admin_scope(), admin)
        .with_state(state.clone())
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            username = tracing::field::Empty,
            role = tracing::field::Empty,
        )
    });

    let mut app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/auth/login", post(api_auth_login))
        .merge(private);
    if let Some(dir) = &state.config.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    let app = app
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    for (name, value) in [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "SAMEORIGIN"),
        ("referrer-policy", "no-referrer"),
        ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
        ("cross-origin-opener-policy", "same-origin"),
        ("cross-origin-resource-policy", "same-origin"),
    ] {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    // Disable caching for API and health endpoints
    if path == "/healthz" || path == "/api" || path.starts_with("/api/") {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("username", tracing::field::display(&auth.claims.sub));
        span.record("role", tracing::field::display(auth.claims.role));
    }
    Ok(next.run(req).await)
}

async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::AuthReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    let user = state.config.user(&body.username).ok_or_else(|| {
        tracing::warn!(username=%body.username, "login: unknown username");
        AppError::unauthorized()
    })?;
    if !verify(&body.password, &user.password_hash).map_err(|e| {
        tracing::error!(username=%body.username, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(username=%body.username, "login: invalid password");
        return Err(AppError::unauthorized());
    }
    // Config users are seeded at startup; a miss means the DB is out of sync.
    let row = state
        .store
        .get_user_by_username(&user.username)
        .await?
        .ok_or_else(|| AppError::internal(format!("user not seeded: {}", user.username)))?;
    let token = auth::issue_jwt_for_user(&state, &user.username, user.role, row.id).await?;
    Ok(Json(api::AuthResp { token }))
}

async fn api_auth_logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .sessions
        .remove(&auth.claims.jti)
        .await
        .map_err(AppError::internal)?;
    tracing::debug!(jti = %auth.claims.jti, removed, "logout");
    Ok(StatusCode::NO_CONTENT)
}

async fn api_me(Extension(auth): Extension<AuthCtx>) -> Json<api::MeDto> {
    Json(api::MeDto {
        user_id: auth.claims.user_id,
        username: auth.claims.sub,
        role: auth.claims.role,
    })
}

#[derive(Deserialize)]
struct RelevantQuery {
    date: Option<String>,
}

async fn api_relevant_routines(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(q): Query<RelevantQuery>,
) -> Result<Json<Vec<api::DisplayableRoutineDto>>, AppError> {
    let today = match q.date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request(format!("invalid date: {s}")))?,
        None => state.today(),
    };
    let items = state
        .routines
        .relevant_routines(auth.user_id(), today)
        .await?;
    Ok(Json(items.iter().map(dto::displayable_routine).collect()))
}

async fn api_routine_chores(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<api::RoutineChoreDto>>, AppError> {
    owned_routine(&state, &auth, id).await?;
    let items = state.routines.chores().reconcile(id).await?;
    Ok(Json(items.iter().map(dto::routine_chore).collect()))
}

#[derive(Deserialize)]
struct RoutineChorePath {
    id: i32,
    chore_id: i32,
}

async fn api_set_chore_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(p): Path<RoutineChorePath>,
    Json(body): Json<api::ChoreCompletionReq>,
) -> Result<Json<api::ChoreCompletionResp>, AppError> {
    owned_routine(&state, &auth, p.id).await?;
    let (record, chore) = state
        .routines
        .chores()
        .upsert_completion(p.id, p.chore_id, body.completed, auth.user_id())
        .await?;
    Ok(Json(api::ChoreCompletionResp {
        chore_routine: dto::completion_record(&record, &chore),
    }))
}

async fn api_start_blueprint(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
) -> Result<Json<api::RoutineDto>, AppError> {
    let routine = state
        .routines
        .start_from_blueprint(id, auth.user_id())
        .await?;
    tracing::info!(
        routine_id = routine.id,
        blueprint_id = id,
        user_id = auth.user_id(),
        "routine started"
    );
    Ok(Json(dto::routine(&routine)))
}

/// Members may only reach their own routines.
async fn owned_routine(
    state: &AppState,
    auth: &AuthCtx,
    routine_id: i32,
) -> Result<Routine, AppError> {
    let routine = state
        .store
        .get_routine(routine_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("routine not found: {routine_id}")))?;
    if !auth.is_admin() && routine.owner_id != auth.user_id() {
        tracing::warn!(
            routine_id,
            owner_id = routine.owner_id,
            user_id = auth.user_id(),
            "routine owned by another user"
        );
        return Err(AppError::forbidden());
    }
    Ok(routine)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            CoreError::InvalidInput(msg) => AppError::BadRequest(msg),
            CoreError::InvalidState(_) | CoreError::Storage(_) => AppError::internal(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        CoreError::from(e).into()
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(
                status = %status,
                kind = kind,
                message = %msg,
                detail = %detail,
                "request failed"
            );
        } else {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
