//! Read-only summaries for dashboards. Nothing in here writes.

use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    achievements::normalize_status,
    auth::{PublicUser, User},
    permission::Role,
    registrations::RegistrationStatus,
    review::ReviewStatus,
    schedules::Schedule,
    schema::{
        achievements, registrations, schedule_requests, schedules,
        tournaments, users,
    },
    tournaments::Tournament,
    validation::non_blank,
};

pub mod routes;

/// Headline numbers for a coach.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoachKpis {
    /// Share of approved requests on the coach's sessions over the last 30
    /// days, or `None` if there were no requests.
    pub attendance_rate_pct: Option<u32>,
    pub achievements_approved: usize,
    pub achievements_pending: usize,
    pub active_players_this_week: usize,
    pub upcoming_sessions_7d: usize,
    pub reg_pending: usize,
    pub reg_confirmed: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct AchievementCounts {
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

impl AchievementCounts {
    fn add(&mut self, status: ReviewStatus) {
        match status {
            ReviewStatus::Approved => self.approved += 1,
            ReviewStatus::Pending => self.pending += 1,
            ReviewStatus::Rejected => self.rejected += 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CoachPlayer {
    #[serde(flatten)]
    pub player: PublicUser,
    pub achievements: AchievementCounts,
}

/// Ids of the players who share the coach's sport. A coach without a sport
/// has no players.
fn coach_player_ids(
    coach: &User,
    conn: &mut SqliteConnection,
) -> QueryResult<Vec<String>> {
    let Some(sport) = non_blank(coach.sport.as_deref()) else {
        return Ok(Vec::new());
    };
    users::table
        .filter(users::role.eq(Role::Player.as_str()))
        .filter(users::sport.eq(sport))
        .select(users::id)
        .load(conn)
}

fn rounded_pct(part: usize, whole: usize) -> Option<u32> {
    if whole == 0 {
        None
    } else {
        Some(((part as f64 / whole as f64) * 100.0).round() as u32)
    }
}

#[tracing::instrument(skip_all, fields(coach = %coach.id))]
pub fn coach_kpis(
    coach: &User,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> QueryResult<CoachKpis> {
    let players = coach_player_ids(coach, conn)?;

    let mut achievement_counts = AchievementCounts::default();
    achievements::table
        .filter(achievements::user_id.eq_any(&players))
        .select((achievements::status, achievements::verified))
        .load::<(Option<String>, Option<String>)>(conn)?
        .iter()
        .for_each(|(status, verified)| {
            achievement_counts
                .add(normalize_status(status.as_deref(), verified.as_deref()))
        });

    let reg_statuses = registrations::table
        .filter(registrations::user_id.eq_any(&players))
        .select(registrations::status)
        .load::<Option<String>>(conn)?
        .iter()
        .map(|s| RegistrationStatus::from_stored(s.as_deref()))
        .counts();

    // (player, status, created) for requests on this coach's sessions
    let requests: Vec<(String, String, NaiveDateTime)> =
        schedule_requests::table
            .inner_join(schedules::table)
            .filter(schedules::coach_id.eq(&coach.id))
            .select((
                schedule_requests::player_id,
                schedule_requests::status,
                schedule_requests::created_at,
            ))
            .load(conn)?;

    let within = |created: &NaiveDateTime, days: i64| {
        now.signed_duration_since(*created) <= Duration::days(days)
    };
    let last_month = requests
        .iter()
        .filter(|(_, _, created)| within(created, 30))
        .collect::<Vec<_>>();
    let approved_last_month = last_month
        .iter()
        .filter(|(_, status, _)| status == ReviewStatus::Approved.as_str())
        .count();
    let active_players = requests
        .iter()
        .filter(|(_, status, created)| {
            within(created, 7)
                && (status == ReviewStatus::Approved.as_str()
                    || status == ReviewStatus::Pending.as_str())
        })
        .map(|(player, _, _)| player.as_str())
        .collect::<HashSet<_>>()
        .len();

    let window_start = now.date().and_time(NaiveTime::MIN);
    let window_end = window_start + Duration::days(7);
    let upcoming = Schedule::list_by_coach(&coach.id, conn)?
        .iter()
        .map(Schedule::starts_at)
        .filter(|at| *at >= window_start && *at <= window_end)
        .count();

    Ok(CoachKpis {
        attendance_rate_pct: rounded_pct(approved_last_month, last_month.len()),
        achievements_approved: achievement_counts.approved,
        achievements_pending: achievement_counts.pending,
        active_players_this_week: active_players,
        upcoming_sessions_7d: upcoming,
        reg_pending: reg_statuses
            .get(&RegistrationStatus::Pending)
            .copied()
            .unwrap_or(0),
        reg_confirmed: reg_statuses
            .get(&RegistrationStatus::Confirmed)
            .copied()
            .unwrap_or(0),
    })
}

/// Players of the coach's sport with a tally of their achievements.
pub fn coach_players(
    coach: &User,
    conn: &mut SqliteConnection,
) -> QueryResult<Vec<CoachPlayer>> {
    let Some(sport) = non_blank(coach.sport.as_deref()) else {
        return Ok(Vec::new());
    };
    let players = User::list_players(Some(sport), conn)?;
    let ids = players.iter().map(|p| p.id.clone()).collect::<Vec<_>>();

    let mut counts: IndexMap<String, AchievementCounts> = IndexMap::new();
    for (owner, status, verified) in achievements::table
        .filter(achievements::user_id.eq_any(&ids))
        .select((
            achievements::user_id,
            achievements::status,
            achievements::verified,
        ))
        .load::<(String, Option<String>, Option<String>)>(conn)?
    {
        counts
            .entry(owner)
            .or_default()
            .add(normalize_status(status.as_deref(), verified.as_deref()));
    }

    Ok(players
        .into_iter()
        .map(|player| CoachPlayer {
            achievements: counts.get(&player.id).copied().unwrap_or_default(),
            player: PublicUser::from(player),
        })
        .collect())
}

/// Pending player registrations across the tournaments an admin created.
pub fn admin_pending_registrations(
    admin_id: &str,
    conn: &mut SqliteConnection,
) -> QueryResult<i64> {
    registrations::table
        .inner_join(tournaments::table)
        .inner_join(users::table)
        .filter(tournaments::created_by.eq(admin_id))
        .filter(users::role.eq(Role::Player.as_str()))
        .filter(registrations::status.eq(RegistrationStatus::Pending.as_str()))
        .count()
        .get_result(conn)
}

/// The notification badges shown on a user's dashboard, keyed by name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub role: Role,
    pub badges: IndexMap<String, usize>,
}

pub fn dashboard(
    user: &User,
    conn: &mut SqliteConnection,
) -> QueryResult<Dashboard> {
    let role = user.role();
    let mut badges = IndexMap::new();
    match role {
        Role::Admin => {
            let pending = admin_pending_registrations(&user.id, conn)?;
            badges.insert("pendingRegistrations".to_string(), pending as usize);
        }
        Role::GovernmentOfficial => {
            let pending = Tournament::count_submitted_near(
                user.address.as_deref().unwrap_or_default(),
                conn,
            )?;
            badges.insert("pendingApprovals".to_string(), pending);
        }
        Role::Coach => {
            let pending = crate::achievements::Achievement::list_pending(
                non_blank(user.sport.as_deref()),
                conn,
            )?
            .len();
            badges.insert("pendingAchievements".to_string(), pending);
        }
        Role::Player => {}
    }
    Ok(Dashboard { role, badges })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        achievements::{Achievement, NewAchievement},
        registrations::Registration,
        review::Decision,
        schedules::{NewSchedule, Schedule, requests::ScheduleRequest},
        test::{conn, make_published_tournament, make_tournament, make_user},
    };

    fn achievement(sport: &str) -> NewAchievement {
        NewAchievement {
            title: Some("Open".to_string()),
            date: Some("2025-01-10".to_string()),
            sport: Some(sport.to_string()),
            venue: Some("Hall".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn percentages_round() {
        assert_eq!(rounded_pct(0, 0), None);
        assert_eq!(rounded_pct(1, 3), Some(33));
        assert_eq!(rounded_pct(2, 3), Some(67));
        assert_eq!(rounded_pct(3, 3), Some(100));
    }

    #[test]
    fn kpis_for_a_coach() {
        let mut conn = conn();
        let now = Utc::now().naive_utc();
        let coach = make_user(&mut conn, "coach", Role::Coach, Some("Chess"));
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let asha = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let ravi = make_user(&mut conn, "ravi", Role::Player, Some("Chess"));
        let other =
            make_user(&mut conn, "other", Role::Player, Some("Football"));

        let a = Achievement::submit(&asha.id, achievement("Chess"), &mut conn)
            .unwrap();
        Achievement::submit(&ravi.id, achievement("Chess"), &mut conn).unwrap();
        Achievement::submit(&other.id, achievement("Football"), &mut conn)
            .unwrap();
        Achievement::decide(
            &asha.id,
            &a.id,
            Decision::Approved,
            &coach,
            None,
            &mut conn,
        )
        .unwrap();

        let gated = make_published_tournament(&mut conn, &admin, true);
        let open = make_published_tournament(&mut conn, &admin, false);
        Registration::register(&asha.id, &gated, &mut conn).unwrap();
        Registration::register(&ravi.id, &open, &mut conn).unwrap();
        Registration::register(&other.id, &gated, &mut conn).unwrap();

        let tomorrow = (now + Duration::days(1)).date();
        let s = Schedule::create(
            &coach.id,
            "Chess",
            NewSchedule {
                date: Some(tomorrow.format("%Y-%m-%d").to_string()),
                start: Some("10:00".to_string()),
                venue: Some("Club".to_string()),
                ..Default::default()
            },
            &mut conn,
        )
        .unwrap();
        Schedule::create(
            &coach.id,
            "Chess",
            NewSchedule {
                date: Some(
                    (now + Duration::days(30))
                        .date()
                        .format("%Y-%m-%d")
                        .to_string(),
                ),
                start: Some("10:00".to_string()),
                venue: Some("Club".to_string()),
                ..Default::default()
            },
            &mut conn,
        )
        .unwrap();

        let r1 =
            ScheduleRequest::create(&s.id, &asha.id, None, &mut conn).unwrap();
        ScheduleRequest::create(&s.id, &ravi.id, None, &mut conn).unwrap();
        let r3 =
            ScheduleRequest::create(&s.id, &other.id, None, &mut conn).unwrap();
        ScheduleRequest::decide(&r1.id, Decision::Approved, &mut conn).unwrap();
        ScheduleRequest::decide(&r3.id, Decision::Rejected, &mut conn).unwrap();

        let kpis = coach_kpis(&coach, now, &mut conn).unwrap();
        assert_eq!(
            kpis,
            CoachKpis {
                attendance_rate_pct: Some(33),
                achievements_approved: 1,
                achievements_pending: 1,
                active_players_this_week: 2,
                upcoming_sessions_7d: 1,
                reg_pending: 1,
                reg_confirmed: 1,
            }
        );

        // a month and a half later the requests have aged out
        let later =
            coach_kpis(&coach, now + Duration::days(45), &mut conn).unwrap();
        assert_eq!(later.attendance_rate_pct, None);
        assert_eq!(later.active_players_this_week, 0);
    }

    #[test]
    fn dashboard_badges() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let other_admin = make_user(&mut conn, "admin2", Role::Admin, None);
        let player = make_user(&mut conn, "asha", Role::Player, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);

        let mine = make_published_tournament(&mut conn, &admin, true);
        let theirs = make_published_tournament(&mut conn, &other_admin, true);
        Registration::register(&player.id, &mine, &mut conn).unwrap();
        Registration::register(&player.id, &theirs, &mut conn).unwrap();

        let board = dashboard(&admin, &mut conn).unwrap();
        assert_eq!(board.role, Role::Admin);
        assert_eq!(board.badges.get("pendingRegistrations"), Some(&1));

        make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);
        make_tournament(&mut conn, &admin, "Goa", "Panaji", false);
        let board = dashboard(&official, &mut conn).unwrap();
        assert_eq!(board.badges.get("pendingApprovals"), Some(&2));

        assert!(dashboard(&player, &mut conn).unwrap().badges.is_empty());
    }

    #[test]
    fn coach_player_directory() {
        let mut conn = conn();
        let coach = make_user(&mut conn, "coach", Role::Coach, Some("Chess"));
        let asha = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        make_user(&mut conn, "ravi", Role::Player, Some("Chess"));
        make_user(&mut conn, "other", Role::Player, Some("Football"));

        let a = Achievement::submit(&asha.id, achievement("Chess"), &mut conn)
            .unwrap();
        Achievement::submit(&asha.id, achievement("Chess"), &mut conn).unwrap();
        Achievement::decide(
            &asha.id,
            &a.id,
            Decision::Rejected,
            &coach,
            Some("Wrong event"),
            &mut conn,
        )
        .unwrap();

        let players = coach_players(&coach, &mut conn).unwrap();
        assert_eq!(
            players
                .iter()
                .map(|p| p.player.username.as_str())
                .collect::<Vec<_>>(),
            vec!["asha", "ravi"]
        );
        assert_eq!(
            players[0].achievements,
            AchievementCounts {
                approved: 0,
                pending: 1,
                rejected: 1
            }
        );
        assert_eq!(players[1].achievements, AchievementCounts::default());
    }
}
