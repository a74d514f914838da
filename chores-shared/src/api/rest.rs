//! Minimal REST client helpers for API consumers (scripts, tests, kiosks).
//! Feature-gated by `rest-client` to avoid pulling reqwest in the server binary.

use super::endpoints as ep;
use super::*;

pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serde: {0}")]
    Serde(String),
}

fn mk_client() -> Result<reqwest::Client, RestError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| RestError::Http(e.to_string()))
}

async fn handle_json<T: for<'de> serde::Deserialize<'de>>(
    res: reqwest::Response,
) -> Result<T, RestError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    res.json::<T>()
        .await
        .map_err(|e| RestError::Serde(e.to_string()))
}

async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response, RestError> {
    req.send().await.map_err(|e| RestError::Http(e.to_string()))
}

pub async fn login(base: &str, req: &AuthReq) -> Result<AuthResp, RestError> {
    let client = mk_client()?;
    let res = send(client.post(ep::auth_login(base)).json(req)).await?;
    handle_json(res).await
}

pub async fn logout(base: &str, bearer: &str) -> Result<(), RestError> {
    let client = mk_client()?;
    let res = send(client.post(ep::auth_logout(base)).bearer_auth(bearer)).await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

pub async fn me(base: &str, bearer: &str) -> Result<MeDto, RestError> {
    let client = mk_client()?;
    let res = send(client.get(ep::me(base)).bearer_auth(bearer)).await?;
    handle_json(res).await
}

/// `date` is `YYYY-MM-DD`; the server uses its own "today" when absent.
pub async fn relevant_routines(
    base: &str,
    bearer: &str,
    date: Option<&str>,
) -> Result<Vec<DisplayableRoutineDto>, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .get(ep::relevant_routines(base, date))
            .bearer_auth(bearer),
    )
    .await?;
    handle_json(res).await
}

pub async fn routine_chores(
    base: &str,
    routine_id: i32,
    bearer: &str,
) -> Result<Vec<RoutineChoreDto>, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .get(ep::routine_chores(base, routine_id))
            .bearer_auth(bearer),
    )
    .await?;
    handle_json(res).await
}

pub async fn set_chore_completed(
    base: &str,
    routine_id: i32,
    chore_id: i32,
    completed: bool,
    bearer: &str,
) -> Result<ChoreCompletionResp, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .post(ep::routine_chore(base, routine_id, chore_id))
            .bearer_auth(bearer)
            .json(&ChoreCompletionReq { completed }),
    )
    .await?;
    handle_json(res).await
}

pub async fn start_blueprint(
    base: &str,
    blueprint_id: i32,
    bearer: &str,
) -> Result<RoutineDto, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .post(ep::blueprint_start(base, blueprint_id))
            .bearer_auth(bearer),
    )
    .await?;
    handle_json(res).await
}

pub async fn list_chores(base: &str, bearer: &str) -> Result<Vec<ChoreDto>, RestError> {
    let client = mk_client()?;
    let res = send(client.get(ep::admin_chores(base)).bearer_auth(bearer)).await?;
    handle_json(res).await
}

pub async fn create_chore(
    base: &str,
    bearer: &str,
    body: &ChoreReq,
) -> Result<ChoreDto, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .post(ep::admin_chores(base))
            .bearer_auth(bearer)
            .json(body),
    )
    .await?;
    handle_json(res).await
}

pub async fn create_blueprint(
    base: &str,
    bearer: &str,
    body: &BlueprintReq,
) -> Result<BlueprintDetailDto, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .post(ep::admin_blueprints(base))
            .bearer_auth(bearer)
            .json(body),
    )
    .await?;
    handle_json(res).await
}

pub async fn get_blueprint(
    base: &str,
    blueprint_id: i32,
    bearer: &str,
) -> Result<BlueprintDetailDto, RestError> {
    let client = mk_client()?;
    let res = send(
        client
            .get(ep::admin_blueprint(base, blueprint_id))
            .bearer_auth(bearer),
    )
    .await?;
    handle_json(res).await
}
