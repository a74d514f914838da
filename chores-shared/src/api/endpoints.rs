use super::{API_V1_PREFIX, admin_scope};

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_V1_PREFIX))
}
pub fn auth_logout(base: &str) -> String {
    base_join(base, &format!("{}/auth/logout", API_V1_PREFIX))
}
pub fn me(base: &str) -> String {
    base_join(base, &format!("{}/me", API_V1_PREFIX))
}
pub fn relevant_routines(base: &str, date: Option<&str>) -> String {
    let url = base_join(base, &format!("{}/routines/relevant", API_V1_PREFIX));
    match date {
        Some(d) => format!("{}?date={}", url, d),
        None => url,
    }
}
pub fn routine_chores(base: &str, routine_id: i32) -> String {
    base_join(
        base,
        &format!("{}/routines/{}/chores", API_V1_PREFIX, routine_id),
    )
}
pub fn routine_chore(base: &str, routine_id: i32, chore_id: i32) -> String {
    base_join(
        base,
        &format!(
            "{}/routines/{}/chores/{}",
            API_V1_PREFIX, routine_id, chore_id
        ),
    )
}
pub fn blueprint_start(base: &str, blueprint_id: i32) -> String {
    base_join(
        base,
        &format!("{}/blueprints/{}/start", API_V1_PREFIX, blueprint_id),
    )
}
pub fn admin_chores(base: &str) -> String {
    base_join(base, &format!("{}/chores", admin_scope()))
}
pub fn admin_chore(base: &str, chore_id: i32) -> String {
    base_join(base, &format!("{}/chores/{}", admin_scope(), chore_id))
}
pub fn admin_blueprints(base: &str) -> String {
    base_join(base, &format!("{}/blueprints", admin_scope()))
}
pub fn admin_blueprint(base: &str, blueprint_id: i32) -> String {
    base_join(
        base,
        &format!("{}/blueprints/{}", admin_scope(), blueprint_id),
    )
}
pub fn admin_routines(base: &str) -> String {
    base_join(base, &format!("{}/routines", admin_scope()))
}
pub fn admin_routine(base: &str, routine_id: i32) -> String {
    base_join(base, &format!("{}/routines/{}", admin_scope(), routine_id))
}
pub fn admin_images(base: &str) -> String {
    base_join(base, &format!("{}/images", admin_scope()))
}
