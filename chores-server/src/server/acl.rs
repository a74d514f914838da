use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use chores_shared::auth::Role;

/// Role gate for authenticated routes. Ownership of individual routines is
/// checked by the handlers, which know the owner.
pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let segs = segmented(&path);
    let ["api", "v1", rest @ ..] = segs.as_slice() else {
        tracing::warn!(?segs, "ACL: path outside API scope");
        return Err(AppError::forbidden());
    };

    let allowed = match claims.role {
        Role::Admin => allow_admin(&method, rest) || allow_member(&method, rest),
        Role::Member => allow_member(&method, rest),
    };

    if !allowed {
        tracing::warn!(
            method = %method,
            path = %path,
            username = %claims.sub,
            role = %claims.role,
            "ACL: no rule matched; denying"
        );
        return Err(AppError::forbidden());
    }

    Ok(next.run(req).await)
}

fn allow_admin(method: &Method, rest: &[&str]) -> bool {
    let ["admin", rest @ ..] = rest else {
        return false;
    };
    match rest {
        ["chores"] | ["blueprints"] | ["routines"] => {
            *method == Method::GET || *method == Method::POST
        }
        ["chores", id] | ["blueprints", id] => {
            is_id(id) && [Method::GET, Method::PUT, Method::DELETE].contains(method)
        }
        ["routines", id] => is_id(id) && *method == Method::DELETE,
        ["images"] => *method == Method::GET,
        _ => false,
    }
}

fn allow_member(method: &Method, rest: &[&str]) -> bool {
    match rest {
        ["auth", "logout"] => *method == Method::POST,
        ["me"] => *method == Method::GET,
        ["routines", "relevant"] => *method == Method::GET,
        ["routines", id, "chores"] => is_id(id) && *method == Method::GET,
        ["routines", id, "chores", chore] => is_id(id) && is_id(chore) && *method == Method::POST,
        ["blueprints", id, "start"] => is_id(id) && *method == Method::POST,
        _ => false,
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_id(seg: &str) -> bool {
    seg.parse::<i32>().is_ok()
}
