use axum::Json;
use axum_extra::extract::WithRejection;

use crate::{
    auth::User,
    permission::Role,
    schedules::{NewSchedule, Schedule},
    state::Conn,
    util_resp::{JsonBody, StandardResponse, bad_request, created, success},
    validation::non_blank,
};

pub async fn do_create_schedule(
    user: User,
    mut conn: Conn<true>,
    WithRejection(Json(fields), _): JsonBody<NewSchedule>,
) -> StandardResponse<Schedule> {
    user.check_role(Role::Coach)?;

    // sessions always take the coach's own sport
    let Some(sport) = non_blank(user.sport.as_deref()) else {
        return bad_request("set your sport on your profile first");
    };
    created(Schedule::create(&user.id, sport, fields, &mut conn)?)
}

pub async fn list_my_schedules(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Vec<Schedule>> {
    user.check_role(Role::Coach)?;
    success(Schedule::list_by_coach(&user.id, &mut conn)?)
}
