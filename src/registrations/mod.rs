//! Player registrations for tournaments.
//!
//! A registration is PENDING or CONFIRMED from the moment it is made,
//! depending on whether the tournament wants to approve entrants. Rows from
//! before registrations had a status have a `NULL` status and count as
//! CONFIRMED.

use std::{fmt, str::FromStr};

use axum::extract::Path;
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    schema::{registrations, tournaments},
    state::Conn,
    tournaments::{
        Tournament, TournamentRow, TournamentStatus, listing::format_range,
    },
    util_resp::{FailureResponse, StandardResponse, created, success},
};

pub mod manage;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Confirmed => "CONFIRMED",
            RegistrationStatus::Rejected => "REJECTED",
        }
    }

    /// Reads a stored status; a missing one is a legacy confirmation.
    pub fn from_stored(stored: Option<&str>) -> RegistrationStatus {
        stored
            .and_then(|s| s.parse().ok())
            .unwrap_or(RegistrationStatus::Confirmed)
    }

    /// PENDING and CONFIRMED registrations hold the player's place.
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Rejected)
    }

    pub(crate) fn initial(needs_approval: bool) -> RegistrationStatus {
        if needs_approval {
            RegistrationStatus::Pending
        } else {
            RegistrationStatus::Confirmed
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RegistrationStatus::Pending),
            "CONFIRMED" => Ok(RegistrationStatus::Confirmed),
            "REJECTED" => Ok(RegistrationStatus::Rejected),
            _ => Err(format!("unknown registration status `{s}`")),
        }
    }
}

impl TryFrom<String> for RegistrationStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = registrations)]
#[diesel(check_for_backend(Sqlite))]
pub struct RegistrationRow {
    pub id: String,
    pub user_id: String,
    pub tournament_id: String,
    pub status: Option<String>,
    pub registered_at: NaiveDateTime,
    pub reminder: bool,
    pub decision_reason: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    pub tournament_id: String,
    pub reg_status: RegistrationStatus,
    pub registered_at: NaiveDateTime,
    pub reminder: bool,
    pub reg_decision_reason: String,
    pub reg_decision_by: Option<String>,
    pub reg_decision_at: Option<NaiveDateTime>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        Registration {
            id: row.id,
            user_id: row.user_id,
            tournament_id: row.tournament_id,
            reg_status: RegistrationStatus::from_stored(row.status.as_deref()),
            registered_at: row.registered_at,
            reminder: row.reminder,
            reg_decision_reason: row.decision_reason,
            reg_decision_by: row.decided_by,
            reg_decision_at: row.decided_at,
        }
    }
}

/// One of the player's own registrations, with enough of the tournament to
/// show it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MyRegistration {
    #[serde(flatten)]
    pub registration: Registration,
    pub name: String,
    pub sport: String,
    pub venue: String,
    pub state: String,
    pub district: String,
    pub description: String,
    pub date: String,
    pub start_date_time: NaiveDateTime,
}

impl Registration {
    pub fn find(
        player_id: &str,
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Option<Registration>> {
        Ok(registrations::table
            .filter(
                registrations::user_id
                    .eq(player_id)
                    .and(registrations::tournament_id.eq(tournament_id)),
            )
            .select(RegistrationRow::as_select())
            .first::<RegistrationRow>(conn)
            .optional()?
            .map(Registration::from))
    }

    /// Signs the player up. A player who already holds a place gets a
    /// [`WorkflowError::Conflict`]; one who was rejected may try again, which
    /// replaces the old registration.
    #[tracing::instrument(
        skip(conn, tournament),
        fields(tournament = %tournament.id)
    )]
    pub fn register(
        player_id: &str,
        tournament: &Tournament,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Registration> {
        let status = RegistrationStatus::initial(tournament.needs_approval);
        let now = Utc::now().naive_utc();

        match Registration::find(player_id, &tournament.id, conn)? {
            Some(existing) if existing.reg_status.is_active() => {
                return Err(WorkflowError::Conflict(
                    "already registered for this tournament".to_string(),
                ));
            }
            Some(rejected) => {
                diesel::update(registrations::table.find(&rejected.id))
                    .set((
                        registrations::status.eq(status.as_str()),
                        registrations::registered_at.eq(now),
                        registrations::decision_reason.eq(""),
                        registrations::decided_by.eq(None::<String>),
                        registrations::decided_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn)?;
                tracing::info!(
                    "rejected player {player_id} registered again as {status}"
                );
            }
            None => {
                diesel::insert_into(registrations::table)
                    .values((
                        registrations::id.eq(Uuid::now_v7().to_string()),
                        registrations::user_id.eq(player_id),
                        registrations::tournament_id.eq(&tournament.id),
                        registrations::status.eq(status.as_str()),
                        registrations::registered_at.eq(now),
                        registrations::reminder.eq(false),
                        registrations::decision_reason.eq(""),
                    ))
                    .execute(conn)?;
                tracing::info!("player {player_id} registered ({status})");
            }
        }

        Registration::find(player_id, &tournament.id, conn)?
            .ok_or(WorkflowError::NotFound("registration"))
    }

    /// Whether the player currently holds a place. Not having registered at
    /// all counts as not holding one.
    pub fn is_active(
        player_id: &str,
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<bool> {
        Ok(Registration::find(player_id, tournament_id, conn)?
            .is_some_and(|r| r.reg_status.is_active()))
    }

    /// Everything the player has registered for, in the order the
    /// tournaments start.
    pub fn list_mine(
        player_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<MyRegistration>> {
        Ok(registrations::table
            .inner_join(tournaments::table)
            .filter(registrations::user_id.eq(player_id))
            .order_by((tournaments::start_at.asc(), registrations::id.asc()))
            .select((RegistrationRow::as_select(), TournamentRow::as_select()))
            .load::<(RegistrationRow, TournamentRow)>(conn)?
            .into_iter()
            .map(|(reg, t)| MyRegistration {
                registration: Registration::from(reg),
                date: format_range(t.start_at, t.end_at),
                start_date_time: t.start_at,
                name: t.name,
                sport: t.sport,
                venue: t.venue,
                state: t.state,
                district: t.district,
                description: t.description,
            })
            .collect())
    }

    /// Flips the reminder flag and returns its new value.
    #[tracing::instrument(skip(conn))]
    pub fn toggle_reminder(
        player_id: &str,
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<bool> {
        let reg = Registration::find(player_id, tournament_id, conn)?
            .ok_or(WorkflowError::NotFound("registration"))?;

        diesel::update(registrations::table.find(&reg.id))
            .set(registrations::reminder.eq(!reg.reminder))
            .execute(conn)?;
        Ok(!reg.reminder)
    }
}

pub async fn do_register_for_tournament(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
) -> StandardResponse<Registration> {
    user.check_role(Role::Player)?;

    // unpublished tournaments do not exist as far as players are concerned
    let tournament = Tournament::fetch(&tournament_id, &mut conn)?;
    if tournament.status != TournamentStatus::Published {
        return Err(FailureResponse::NotFound(
            "tournament not found".to_string(),
        ));
    }

    created(Registration::register(&user.id, &tournament, &mut conn)?)
}

pub async fn list_my_registrations(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Vec<MyRegistration>> {
    success(Registration::list_mine(&user.id, &mut conn)?)
}

#[derive(Serialize)]
pub struct ReminderState {
    reminder: bool,
}

pub async fn do_toggle_reminder(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
) -> StandardResponse<ReminderState> {
    let reminder =
        Registration::toggle_reminder(&user.id, &tournament_id, &mut conn)?;
    success(ReminderState { reminder })
}
