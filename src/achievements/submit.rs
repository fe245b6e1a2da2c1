use axum::{Json, extract::Path};
use axum_extra::extract::WithRejection;
use serde::Serialize;

use crate::{
    achievements::{Achievement, NewAchievement},
    auth::User,
    state::Conn,
    util_resp::{JsonBody, StandardResponse, created, success},
};

pub async fn list_my_achievements(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Vec<Achievement>> {
    success(Achievement::list_for_owner(&user.id, &mut conn)?)
}

pub async fn do_submit_achievement(
    user: User,
    mut conn: Conn<true>,
    WithRejection(Json(fields), _): JsonBody<NewAchievement>,
) -> StandardResponse<Achievement> {
    created(Achievement::submit(&user.id, fields, &mut conn)?)
}

#[derive(Serialize)]
pub struct Deleted {
    ok: bool,
}

pub async fn do_delete_achievement(
    user: User,
    mut conn: Conn<true>,
    Path(achievement_id): Path<String>,
) -> StandardResponse<Deleted> {
    Achievement::delete(&user.id, &achievement_id, &mut conn)?;
    success(Deleted { ok: true })
}
