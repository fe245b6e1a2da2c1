use axum::{
    Json,
    extract::{Path, Query},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    achievements::{Achievement, PendingAchievement},
    auth::User,
    permission::Role,
    review::Decision,
    state::Conn,
    util_resp::{JsonBody, QueryParams, StandardResponse, success},
    validation::non_blank,
};

#[derive(Deserialize)]
pub struct PendingQuery {
    sport: Option<String>,
}

/// Achievements awaiting review. Coaches see their own sport unless they ask
/// for another one.
pub async fn list_pending_achievements(
    user: User,
    mut conn: Conn<false>,
    WithRejection(Query(query), _): QueryParams<PendingQuery>,
) -> StandardResponse<Vec<PendingAchievement>> {
    user.check_role(Role::Coach)?;

    let sport = non_blank(query.sport.as_deref())
        .or_else(|| non_blank(user.sport.as_deref()));
    success(Achievement::list_pending(sport, &mut conn)?)
}

#[derive(Deserialize)]
pub struct DecisionForm {
    decision: Decision,
    reason: Option<String>,
}

pub async fn do_decide_achievement(
    user: User,
    mut conn: Conn<true>,
    Path((owner_id, achievement_id)): Path<(String, String)>,
    WithRejection(Json(form), _): JsonBody<DecisionForm>,
) -> StandardResponse<Achievement> {
    user.check_role(Role::Coach)?;

    success(Achievement::decide(
        &owner_id,
        &achievement_id,
        form.decision,
        &user,
        form.reason.as_deref(),
        &mut conn,
    )?)
}
