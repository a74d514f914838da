use async_trait::async_trait;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chores_shared::auth::Role;
use chores_shared::jwt::{self, JwtClaims};
use chrono::{Duration, NaiveDateTime, Utc};
use tracing::{error, warn};

use super::{AppError, AppState};
use crate::storage::{StorageError, Store};

/// How many days of inactivity before a session is considered expired.
const SESSION_IDLE_DAYS: i64 = 14;
/// How many days before mandatory re-login.
const TOKEN_TTL_DAYS: i64 = 30;

/// Server-side session registry keyed by token id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, jti: &str, user_id: i32) -> Result<(), StorageError>;
    /// Returns the session's user when it exists and was used after
    /// `cutoff`, refreshing its last-used time.
    async fn resolve(&self, jti: &str, cutoff: NaiveDateTime)
    -> Result<Option<i32>, StorageError>;
    async fn remove(&self, jti: &str) -> Result<bool, StorageError>;
}

#[async_trait]
impl SessionStore for Store {
    async fn insert(&self, jti: &str, user_id: i32) -> Result<(), StorageError> {
        self.create_session(jti, user_id).await
    }

    async fn resolve(
        &self,
        jti: &str,
        cutoff: NaiveDateTime,
    ) -> Result<Option<i32>, StorageError> {
        if !self.touch_session_with_cutoff(jti, cutoff).await? {
            return Ok(None);
        }
        Ok(self.get_session(jti).await?.map(|s| s.user_id))
    }

    async fn remove(&self, jti: &str) -> Result<bool, StorageError> {
        self.delete_session(jti).await
    }
}

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

impl AuthCtx {
    pub fn user_id(&self) -> i32 {
        self.claims.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.claims.role == Role::Admin
    }
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(AppError::unauthorized)?;

    let claims = match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return Err(AppError::unauthorized());
        }
    };

    // Accounts removed from the config lose access even with a live token.
    match state.config.user(&claims.sub) {
        Some(u) if u.role == claims.role => {}
        _ => {
            warn!(
                username = %claims.sub,
                role = %claims.role,
                "auth: user or role no longer configured"
            );
            return Err(AppError::unauthorized());
        }
    }

    let cutoff = Utc::now() - Duration::days(SESSION_IDLE_DAYS);
    match state.sessions.resolve(&claims.jti, cutoff.naive_utc()).await {
        Ok(Some(user_id)) if user_id == claims.user_id => {}
        Ok(Some(user_id)) => {
            warn!(
                jti = %claims.jti,
                session_user = user_id,
                token_user = claims.user_id,
                "auth: session user mismatch"
            );
            return Err(AppError::unauthorized());
        }
        Ok(None) => {
            warn!(
                jti = %claims.jti,
                username = %claims.sub,
                idle_days = SESSION_IDLE_DAYS,
                "auth: session missing or expired"
            );
            return Err(AppError::unauthorized());
        }
        Err(e) => {
            error!(jti = %claims.jti, error=%e, "auth: session lookup failed");
            return Err(AppError::internal(e));
        }
    }
    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

pub async fn issue_jwt_for_user(
    state: &AppState,
    username: &str,
    role: Role,
    user_id: i32,
) -> Result<String, AppError> {
    let jti = uuid::Uuid::new_v4().to_string();
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
    let claims = JwtClaims {
        sub: username.to_string(),
        jti: jti.clone(),
        exp,
        role,
        user_id,
    };

    state.sessions.insert(&jti, user_id).await.map_err(|e| {
        error!(username, error=%e, "login: create session failed");
        AppError::internal(e)
    })?;
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(username, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })
}
