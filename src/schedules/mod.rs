//! Practice sessions published by coaches.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{WorkflowError, WorkflowResult},
    schema::schedules,
    validation::non_blank,
};

pub mod manage;
pub mod requests;

/// Whether players can simply turn up, or have to ask first.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Entrance {
    Open,
    Approval,
}

impl Entrance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entrance::Open => "OPEN",
            Entrance::Approval => "APPROVAL",
        }
    }
}

impl fmt::Display for Entrance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entrance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Entrance::Open),
            "APPROVAL" => Ok(Entrance::Approval),
            _ => Err(format!("unknown entrance policy `{s}`")),
        }
    }
}

impl TryFrom<String> for Entrance {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = schedules)]
#[diesel(check_for_backend(Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub coach_id: String,
    pub sport: String,
    pub date: NaiveDate,
    #[serde(rename = "start")]
    pub start_time: NaiveTime,
    #[serde(rename = "end")]
    pub end_time: Option<NaiveTime>,
    pub venue: String,
    pub entrance: String,
    pub created_at: NaiveDateTime,
}

/// A session as typed in by the coach. Dates are `YYYY-MM-DD`, times
/// `HH:MM`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct NewSchedule {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub venue: Option<String>,
    pub entrance: Option<Entrance>,
}

pub(crate) fn parse_time(
    value: &str,
    field: &str,
) -> WorkflowResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| {
            WorkflowError::validation(format!("{field} must be HH:MM"))
        })
}

impl Schedule {
    /// Adds a session. Sessions are allowed to overlap.
    #[tracing::instrument(skip(conn, fields))]
    pub fn create(
        coach_id: &str,
        sport: &str,
        fields: NewSchedule,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Schedule> {
        let sport = non_blank(Some(sport))
            .ok_or_else(|| WorkflowError::validation("sport is required"))?;
        let venue = non_blank(fields.venue.as_deref())
            .ok_or_else(|| WorkflowError::validation("venue is required"))?;
        let date = non_blank(fields.date.as_deref())
            .ok_or_else(|| WorkflowError::validation("date is required"))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            WorkflowError::validation("date must be formatted as YYYY-MM-DD")
        })?;
        let start = non_blank(fields.start.as_deref()).ok_or_else(|| {
            WorkflowError::validation("start time is required")
        })?;
        let start = parse_time(start, "start")?;
        let end = match non_blank(fields.end.as_deref()) {
            Some(end) => Some(parse_time(end, "end")?),
            None => None,
        };
        let entrance = fields.entrance.unwrap_or(Entrance::Open);

        let id = Uuid::now_v7().to_string();
        diesel::insert_into(schedules::table)
            .values((
                schedules::id.eq(&id),
                schedules::coach_id.eq(coach_id),
                schedules::sport.eq(sport),
                schedules::date.eq(date),
                schedules::start_time.eq(start),
                schedules::end_time.eq(end),
                schedules::venue.eq(venue),
                schedules::entrance.eq(entrance.as_str()),
                schedules::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        tracing::info!("coach {coach_id} scheduled session {id} on {date}");
        Schedule::fetch(&id, conn)
    }

    pub fn fetch(
        id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Schedule> {
        schedules::table
            .find(id)
            .select(Schedule::as_select())
            .first::<Schedule>(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("schedule"))
    }

    /// The coach's sessions, most recently created first.
    pub fn list_by_coach(
        coach_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<Schedule>> {
        schedules::table
            .filter(schedules::coach_id.eq(coach_id))
            .order_by((schedules::created_at.desc(), schedules::id.desc()))
            .select(Schedule::as_select())
            .load(conn)
    }

    pub fn entrance(&self) -> Entrance {
        self.entrance.parse().unwrap_or(Entrance::Open)
    }

    /// When the session begins.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }
}
