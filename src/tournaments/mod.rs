//! Tournaments and their review/publication lifecycle.
//!
//! ```text
//! DRAFT -> SUBMITTED -> APPROVED -> PUBLISHED
//!                    \-> REJECTED
//!          PUBLISHED -> APPROVED (unpublish)
//! ```
//!
//! Tournaments are always created as SUBMITTED, so nothing currently puts one
//! into DRAFT.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use diesel::{prelude::*, sqlite::Sqlite};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    schema::tournaments,
    util_resp::FailureResponse,
};

pub mod create;
pub mod listing;
pub mod publish;
pub mod review;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum TournamentStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Published,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "DRAFT",
            TournamentStatus::Submitted => "SUBMITTED",
            TournamentStatus::Approved => "APPROVED",
            TournamentStatus::Rejected => "REJECTED",
            TournamentStatus::Published => "PUBLISHED",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_become(&self, to: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, to),
            (Draft, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Approved, Published)
                | (Published, Approved)
        )
    }

    pub fn check_transition(&self, to: TournamentStatus) -> WorkflowResult<()> {
        if self.can_become(to) {
            Ok(())
        } else {
            Err(WorkflowError::transition(self, to))
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(TournamentStatus::Draft),
            "SUBMITTED" => Ok(TournamentStatus::Submitted),
            "APPROVED" => Ok(TournamentStatus::Approved),
            "REJECTED" => Ok(TournamentStatus::Rejected),
            "PUBLISHED" => Ok(TournamentStatus::Published),
            _ => Err(format!("unknown tournament status `{s}`")),
        }
    }
}

impl TryFrom<String> for TournamentStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Eligibility {
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub gender: Option<String>,
    pub district_restricted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    pub max_teams: Option<i32>,
    pub max_players: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRules {
    pub fee: Decimal,
    pub documents: Vec<String>,
    pub last_date: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Media {
    /// Usually a data URL; stored as given.
    pub banner: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Organizer {
    pub name: String,
    pub mobile: String,
    pub email: String,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = tournaments)]
#[diesel(check_for_backend(Sqlite))]
pub struct TournamentRow {
    pub id: String,
    pub created_by: String,
    pub name: String,
    pub sport: String,
    pub venue: String,
    pub state: String,
    pub district: String,
    pub description: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub gender: String,
    pub district_restricted: bool,
    pub format: String,
    pub max_teams: Option<i32>,
    pub max_players: Option<i32>,
    pub registration_fee: String,
    pub registration_documents: String,
    pub registration_last_date: Option<NaiveDateTime>,
    pub banner: String,
    pub organizer_name: String,
    pub organizer_mobile: String,
    pub organizer_email: String,
    pub needs_approval: bool,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: String,
    pub published_by: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    pub created_by: String,
    pub name: String,
    pub sport: String,
    pub venue: String,
    pub state: String,
    pub district: String,
    pub description: String,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
    pub eligibility: Eligibility,
    pub format: String,
    pub limits: Limits,
    pub registration: RegistrationRules,
    pub media: Media,
    pub organizer: Organizer,
    pub needs_approval: bool,
    pub status: TournamentStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: String,
    pub published_by: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<TournamentRow> for Tournament {
    fn from(row: TournamentRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            tracing::warn!("tournament {}: {e}", row.id);
            TournamentStatus::Draft
        });
        Tournament {
            id: row.id,
            created_by: row.created_by,
            name: row.name,
            sport: row.sport,
            venue: row.venue,
            state: row.state,
            district: row.district,
            description: row.description,
            start_date_time: row.start_at,
            end_date_time: row.end_at,
            eligibility: Eligibility {
                age_min: row.age_min,
                age_max: row.age_max,
                gender: Some(row.gender),
                district_restricted: row.district_restricted,
            },
            format: row.format,
            limits: Limits {
                max_teams: row.max_teams,
                max_players: row.max_players,
            },
            registration: RegistrationRules {
                fee: row.registration_fee.parse().unwrap_or_default(),
                documents: serde_json::from_str(&row.registration_documents)
                    .unwrap_or_default(),
                last_date: row.registration_last_date,
            },
            media: Media { banner: row.banner },
            organizer: Organizer {
                name: row.organizer_name,
                mobile: row.organizer_mobile,
                email: row.organizer_email,
            },
            needs_approval: row.needs_approval,
            status,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            review_note: row.review_note,
            published_by: row.published_by,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Accepts RFC 3339 timestamps (converted to UTC), plain
/// `YYYY-MM-DDTHH:MM[:SS]` and bare dates (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl Tournament {
    pub fn fetch(
        id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        tournaments::table
            .find(id)
            .select(TournamentRow::as_select())
            .first::<TournamentRow>(conn)
            .optional()?
            .map(Tournament::from)
            .ok_or(WorkflowError::NotFound("tournament"))
    }

    /// The tournaments an admin has created, soonest first.
    pub fn list_created_by(
        admin_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<Tournament>> {
        Ok(tournaments::table
            .filter(tournaments::created_by.eq(admin_id))
            .order_by((tournaments::start_at.asc(), tournaments::id.asc()))
            .select(TournamentRow::as_select())
            .load::<TournamentRow>(conn)?
            .into_iter()
            .map(Tournament::from)
            .collect())
    }

    /// Loads the tournament, failing unless it is currently `from` and the
    /// lifecycle allows it to move on to `to`.
    pub(crate) fn fetch_for_transition(
        id: &str,
        from: TournamentStatus,
        to: TournamentStatus,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        let current = Tournament::fetch(id, conn)?;
        if current.status != from {
            return Err(WorkflowError::transition(current.status, to));
        }
        current.status.check_transition(to)?;
        Ok(current)
    }

    pub fn check_owned_by(&self, user: &User) -> Result<(), FailureResponse> {
        if self.created_by == user.id {
            Ok(())
        } else {
            Err(FailureResponse::Forbidden(
                "this tournament belongs to another admin".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_edges() {
        use TournamentStatus::*;
        assert!(Submitted.can_become(Approved));
        assert!(Submitted.can_become(Rejected));
        assert!(Approved.can_become(Published));
        assert!(Published.can_become(Approved));

        assert!(!Submitted.can_become(Published));
        assert!(!Rejected.can_become(Published));
        assert!(!Rejected.can_become(Submitted));
        assert!(!Published.can_become(Published));
        assert!(!Approved.can_become(Rejected));
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-12-05T09:30:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-12-05T09:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-12-05"),
            NaiveDate::from_ymd_opt(2025, 12, 5).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("next tuesday"), None);
    }
}
