//! Loading a snapshot of the old single-document store.
//!
//! The old store kept everything in one JSON object, with each user's
//! achievements and tournament registrations nested inside the user. Those
//! become rows keyed by the owner's id. Anything already present (by id) is
//! left alone, so importing the same snapshot twice is harmless.

use std::{collections::HashSet, fmt};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    auth::hash_password,
    permission::Role,
    schedules::parse_time,
    schema::{
        achievements, registrations, schedule_requests, schedules,
        tournaments, users,
    },
    tournaments::{
        Eligibility, Limits, Media, Organizer, TournamentStatus,
        create::NewRegistrationRules, parse_timestamp,
    },
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Snapshot {
    users: Vec<LegacyUser>,
    schedules: Vec<LegacySchedule>,
    schedule_requests: Vec<LegacyScheduleRequest>,
    tournaments: Vec<LegacyTournament>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyUser {
    id: String,
    username: Option<String>,
    email: Option<String>,
    /// Only present in the browser-only store, in plain text.
    password: Option<String>,
    role: Option<String>,
    name: Option<String>,
    dob: Option<String>,
    gender: Option<String>,
    mobile: Option<String>,
    sport: Option<String>,
    profile_pic: Option<String>,
    /// Numbers or numeric strings, depending on which form saved them.
    height: Option<serde_json::Value>,
    weight: Option<serde_json::Value>,
    bloodgroup: Option<String>,
    address: Option<String>,
    created_at: Option<String>,
    achievements: Vec<LegacyAchievement>,
    registered_tournaments: Vec<LegacyRegistration>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyAchievement {
    id: String,
    title: String,
    date: String,
    description: String,
    proof: String,
    sport: String,
    venue: String,
    status: Option<String>,
    verified: Option<serde_json::Value>,
    decision_reason: String,
    verified_by: Option<String>,
    verified_by_name: Option<String>,
    verified_at: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyRegistration {
    /// The tournament's id.
    id: String,
    reg_status: Option<String>,
    registered_at: Option<String>,
    reminder: bool,
    reg_decision_reason: String,
    reg_decision_by: Option<String>,
    reg_decision_at: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacySchedule {
    id: String,
    coach_id: String,
    sport: String,
    date: String,
    start_time: String,
    end_time: Option<String>,
    venue: String,
    entrance: Option<String>,
    created_at: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyScheduleRequest {
    id: String,
    schedule_id: String,
    player_id: String,
    status: Option<String>,
    message: String,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyTournament {
    id: String,
    created_by: String,
    name: String,
    sport: String,
    venue: String,
    state: String,
    district: String,
    description: String,
    start_date_time: Option<String>,
    end_date_time: Option<String>,
    eligibility: Eligibility,
    format: Option<String>,
    limits: Limits,
    registration: NewRegistrationRules,
    media: Media,
    organizer: Organizer,
    needs_approval: bool,
    status: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<String>,
    review_note: String,
    published_by: Option<String>,
    published_at: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub achievements: usize,
    pub registrations: usize,
    pub schedules: usize,
    pub schedule_requests: usize,
    pub tournaments: usize,
    /// Records that were unreadable or pointed at something missing.
    pub skipped: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} achievements, {} registrations, {} schedules, \
             {} schedule requests, {} tournaments ({} skipped)",
            self.users,
            self.achievements,
            self.registrations,
            self.schedules,
            self.schedule_requests,
            self.tournaments,
            self.skipped
        )
    }
}

fn measurement(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp_or(value: Option<&str>, fallback: NaiveDateTime) -> NaiveDateTime {
    value.and_then(parse_timestamp).unwrap_or(fallback)
}

/// A value no password can verify against. Users imported without a
/// plain-text password have to have theirs reset.
const LOCKED_PASSWORD: &str = "!";

/// Imports a snapshot inside one transaction.
#[tracing::instrument(skip_all)]
pub fn import_snapshot(
    raw: &str,
    conn: &mut SqliteConnection,
) -> Result<ImportSummary, ImportError> {
    let snapshot: Snapshot = serde_json::from_str(raw)?;
    let now = Utc::now().naive_utc();

    conn.transaction(|conn| {
        let mut summary = ImportSummary::default();

        // rows are only written when whatever they point at made it in
        let mut user_ids = HashSet::new();
        for user in &snapshot.users {
            match import_user(user, now, conn)? {
                Some(inserted) => {
                    summary.users += inserted as usize;
                    user_ids.insert(user.id.as_str());
                }
                None => summary.skipped += 1,
            }
        }

        let mut tournament_ids = HashSet::new();
        for t in &snapshot.tournaments {
            if !user_ids.contains(t.created_by.as_str()) {
                tracing::warn!(
                    "skipping tournament {} by unknown {}",
                    t.id,
                    t.created_by
                );
                summary.skipped += 1;
                continue;
            }
            match import_tournament(t, now, conn)? {
                Some(inserted) => {
                    summary.tournaments += inserted as usize;
                    tournament_ids.insert(t.id.as_str());
                }
                None => summary.skipped += 1,
            }
        }

        let known_users = snapshot
            .users
            .iter()
            .filter(|u| user_ids.contains(u.id.as_str()));
        for user in known_users {
            for a in &user.achievements {
                match import_achievement(&user.id, a, now, conn)? {
                    Some(inserted) => summary.achievements += inserted as usize,
                    None => summary.skipped += 1,
                }
            }

            for r in &user.registered_tournaments {
                // built-in listings were never stored, so there is nothing to
                // point at
                if !tournament_ids.contains(r.id.as_str()) {
                    tracing::warn!(
                        "skipping registration of {} for unknown tournament {}",
                        user.id,
                        r.id
                    );
                    summary.skipped += 1;
                    continue;
                }
                summary.registrations +=
                    import_registration(&user.id, r, now, conn)?;
            }
        }

        let mut schedule_ids = HashSet::new();
        for s in &snapshot.schedules {
            if !user_ids.contains(s.coach_id.as_str()) {
                tracing::warn!(
                    "skipping schedule {} by unknown {}",
                    s.id,
                    s.coach_id
                );
                summary.skipped += 1;
                continue;
            }
            match import_schedule(s, now, conn)? {
                Some(inserted) => {
                    summary.schedules += inserted as usize;
                    schedule_ids.insert(s.id.as_str());
                }
                None => summary.skipped += 1,
            }
        }

        for r in &snapshot.schedule_requests {
            if !schedule_ids.contains(r.schedule_id.as_str())
                || !user_ids.contains(r.player_id.as_str())
            {
                tracing::warn!("skipping dangling schedule request {}", r.id);
                summary.skipped += 1;
                continue;
            }
            let status = r
                .status
                .as_deref()
                .unwrap_or("PENDING")
                .to_ascii_uppercase();
            summary.schedule_requests +=
                diesel::insert_or_ignore_into(schedule_requests::table)
                    .values((
                        schedule_requests::id.eq(&r.id),
                        schedule_requests::schedule_id.eq(&r.schedule_id),
                        schedule_requests::player_id.eq(&r.player_id),
                        schedule_requests::status.eq(status),
                        schedule_requests::message.eq(&r.message),
                        schedule_requests::created_at
                            .eq(timestamp_or(r.created_at.as_deref(), now)),
                        schedule_requests::updated_at
                            .eq(timestamp_or(r.updated_at.as_deref(), now)),
                    ))
                    .execute(conn)?;
        }

        tracing::info!("snapshot imported: {summary}");
        Ok::<_, ImportError>(summary)
    })
}

/// `Ok(None)` when the user cannot be imported at all, otherwise whether a
/// new row was written.
fn import_user(
    user: &LegacyUser,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<Option<bool>, ImportError> {
    let (Some(username), Some(email)) =
        (user.username.as_deref(), user.email.as_deref())
    else {
        tracing::warn!("skipping user {} without username or email", user.id);
        return Ok(None);
    };

    let password_hash = match user.password.as_deref() {
        Some(password) => hash_password(password).unwrap_or_else(|e| {
            tracing::error!("could not hash password of {}: {e}", user.id);
            LOCKED_PASSWORD.to_string()
        }),
        None => {
            tracing::warn!("user {} has no password and is locked", user.id);
            LOCKED_PASSWORD.to_string()
        }
    };
    let role = user
        .role
        .as_deref()
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or(Role::Player);
    let dob = user
        .dob
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    let inserted = diesel::insert_or_ignore_into(users::table)
        .values((
            users::id.eq(&user.id),
            users::username.eq(username.trim()),
            users::email.eq(email.trim().to_lowercase()),
            users::password_hash.eq(password_hash),
            users::role.eq(role.as_str()),
            users::name.eq(&user.name),
            users::dob.eq(dob),
            users::gender.eq(&user.gender),
            users::mobile.eq(&user.mobile),
            users::sport.eq(&user.sport),
            users::profile_pic.eq(&user.profile_pic),
            users::height.eq(measurement(user.height.as_ref())),
            users::weight.eq(measurement(user.weight.as_ref())),
            users::bloodgroup.eq(&user.bloodgroup),
            users::address.eq(&user.address),
            users::created_at.eq(timestamp_or(user.created_at.as_deref(), now)),
        ))
        .execute(conn)?;

    // nothing is written when the email or username already belongs to a
    // different id, and then there is no user to hang records off
    let exists = users::table
        .find(&user.id)
        .select(users::id)
        .first::<String>(conn)
        .optional()?
        .is_some();
    if !exists {
        tracing::warn!(
            "skipping user {}: username or email already taken",
            user.id
        );
        return Ok(None);
    }
    Ok(Some(inserted > 0))
}

fn import_achievement(
    owner_id: &str,
    a: &LegacyAchievement,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<Option<bool>, ImportError> {
    let Some(date) = parse_timestamp(&a.date).map(|d| d.date()) else {
        tracing::warn!("skipping achievement {} with date {:?}", a.id, a.date);
        return Ok(None);
    };
    // kept verbatim and interpreted on every read
    let verified = a.verified.as_ref().map(|v| v.to_string());
    let created = timestamp_or(a.created_at.as_deref(), now);

    let inserted = diesel::insert_or_ignore_into(achievements::table)
        .values((
            achievements::id.eq(&a.id),
            achievements::user_id.eq(owner_id),
            achievements::title.eq(&a.title),
            achievements::achieved_on.eq(date),
            achievements::description.eq(&a.description),
            achievements::proof.eq(&a.proof),
            achievements::sport.eq(&a.sport),
            achievements::venue.eq(&a.venue),
            achievements::status
                .eq(a.status.as_deref().map(str::to_ascii_uppercase)),
            achievements::verified.eq(verified),
            achievements::decision_reason.eq(&a.decision_reason),
            achievements::verified_by.eq(&a.verified_by),
            achievements::verified_by_name.eq(&a.verified_by_name),
            achievements::verified_at
                .eq(a.verified_at.as_deref().and_then(parse_timestamp)),
            achievements::created_at.eq(created),
            achievements::updated_at
                .eq(timestamp_or(a.updated_at.as_deref(), created)),
        ))
        .execute(conn)?;
    Ok(Some(inserted > 0))
}

fn import_registration(
    user_id: &str,
    r: &LegacyRegistration,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<usize, ImportError> {
    Ok(diesel::insert_or_ignore_into(registrations::table)
        .values((
            registrations::id.eq(uuid::Uuid::now_v7().to_string()),
            registrations::user_id.eq(user_id),
            registrations::tournament_id.eq(&r.id),
            // no status means the registration predates approvals
            registrations::status
                .eq(r.reg_status.as_deref().map(str::to_ascii_uppercase)),
            registrations::registered_at
                .eq(timestamp_or(r.registered_at.as_deref(), now)),
            registrations::reminder.eq(r.reminder),
            registrations::decision_reason.eq(&r.reg_decision_reason),
            registrations::decided_by
                .eq(r.reg_decision_by.as_deref().filter(|s| !s.is_empty())),
            registrations::decided_at
                .eq(r.reg_decision_at.as_deref().and_then(parse_timestamp)),
        ))
        .execute(conn)?)
}

fn import_schedule(
    s: &LegacySchedule,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<Option<bool>, ImportError> {
    let date = NaiveDate::parse_from_str(&s.date, "%Y-%m-%d").ok();
    let start = parse_time(&s.start_time, "start").ok();
    let (Some(date), Some(start)) = (date, start) else {
        tracing::warn!("skipping schedule {} with unreadable date/time", s.id);
        return Ok(None);
    };
    let end = s
        .end_time
        .as_deref()
        .filter(|e| !e.is_empty())
        .and_then(|e| parse_time(e, "end").ok());

    let inserted = diesel::insert_or_ignore_into(schedules::table)
        .values((
            schedules::id.eq(&s.id),
            schedules::coach_id.eq(&s.coach_id),
            schedules::sport.eq(&s.sport),
            schedules::date.eq(date),
            schedules::start_time.eq(start),
            schedules::end_time.eq(end),
            schedules::venue.eq(&s.venue),
            schedules::entrance.eq(s
                .entrance
                .as_deref()
                .unwrap_or("OPEN")
                .to_ascii_uppercase()),
            schedules::created_at
                .eq(timestamp_or(s.created_at.as_deref(), now)),
        ))
        .execute(conn)?;
    Ok(Some(inserted > 0))
}

fn import_tournament(
    t: &LegacyTournament,
    now: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<Option<bool>, ImportError> {
    let start = t.start_date_time.as_deref().and_then(parse_timestamp);
    let end = t.end_date_time.as_deref().and_then(parse_timestamp);
    let (Some(start), Some(end)) = (start, end) else {
        tracing::warn!("skipping tournament {} without start/end", t.id);
        return Ok(None);
    };
    let status = t
        .status
        .as_deref()
        .and_then(|s| s.parse::<TournamentStatus>().ok())
        .unwrap_or(TournamentStatus::Submitted);
    let documents = serde_json::to_string(&t.registration.documents)?;
    let fee = t.registration.fee.unwrap_or(Decimal::ZERO).to_string();
    let created = timestamp_or(t.created_at.as_deref(), now);

    let inserted = diesel::insert_or_ignore_into(tournaments::table)
        .values((
            (
                tournaments::id.eq(&t.id),
                tournaments::created_by.eq(&t.created_by),
                tournaments::name.eq(&t.name),
                tournaments::sport.eq(&t.sport),
                tournaments::venue.eq(&t.venue),
                tournaments::state.eq(&t.state),
                tournaments::district.eq(&t.district),
                tournaments::description.eq(&t.description),
                tournaments::start_at.eq(start),
                tournaments::end_at.eq(end),
                tournaments::age_min.eq(t.eligibility.age_min),
                tournaments::age_max.eq(t.eligibility.age_max),
                tournaments::gender
                    .eq(t.eligibility.gender.as_deref().unwrap_or("ANY")),
                tournaments::district_restricted
                    .eq(t.eligibility.district_restricted),
                tournaments::format
                    .eq(t.format.as_deref().unwrap_or("KNOCKOUT")),
                tournaments::max_teams.eq(t.limits.max_teams),
            ),
            (
                tournaments::max_players.eq(t.limits.max_players),
                tournaments::registration_fee.eq(fee),
                tournaments::registration_documents.eq(documents),
                tournaments::registration_last_date.eq(t
                    .registration
                    .last_date
                    .as_deref()
                    .and_then(parse_timestamp)),
                tournaments::banner.eq(&t.media.banner),
                tournaments::organizer_name.eq(&t.organizer.name),
                tournaments::organizer_mobile.eq(&t.organizer.mobile),
                tournaments::organizer_email.eq(&t.organizer.email),
                tournaments::needs_approval.eq(t.needs_approval),
                tournaments::status.eq(status.as_str()),
                tournaments::reviewed_by
                    .eq(t.reviewed_by.as_deref().filter(|s| !s.is_empty())),
                tournaments::reviewed_at
                    .eq(t.reviewed_at.as_deref().and_then(parse_timestamp)),
                tournaments::review_note.eq(&t.review_note),
                tournaments::published_by
                    .eq(t.published_by.as_deref().filter(|s| !s.is_empty())),
                tournaments::published_at
                    .eq(t.published_at.as_deref().and_then(parse_timestamp)),
                tournaments::created_at.eq(created),
            ),
            tournaments::updated_at
                .eq(timestamp_or(t.updated_at.as_deref(), created)),
        ))
        .execute(conn)?;
    Ok(Some(inserted > 0))
}
