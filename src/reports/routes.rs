use chrono::Utc;

use crate::{
    auth::User,
    permission::Role,
    reports::{
        CoachKpis, CoachPlayer, Dashboard, coach_kpis, coach_players,
        dashboard,
    },
    state::Conn,
    util_resp::{StandardResponse, success},
};

pub async fn coach_report(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<CoachKpis> {
    user.check_role(Role::Coach)?;
    success(coach_kpis(&user, Utc::now().naive_utc(), &mut conn)?)
}

pub async fn dashboard_badges(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Dashboard> {
    success(dashboard(&user, &mut conn)?)
}

pub async fn list_coach_players(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Vec<CoachPlayer>> {
    user.check_role(Role::Coach)?;
    success(coach_players(&user, &mut conn)?)
}
