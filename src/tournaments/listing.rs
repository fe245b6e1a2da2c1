use axum::extract::Query;
use axum_extra::extract::WithRejection;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::User,
    permission::Role,
    schema::tournaments,
    state::Conn,
    tournaments::{Tournament, TournamentRow, TournamentStatus},
    util_resp::{QueryParams, StandardResponse, success},
    validation::non_blank,
};

/// A tournament together with a display string for when it runs.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListedTournament {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub range: String,
}

impl From<Tournament> for ListedTournament {
    fn from(tournament: Tournament) -> Self {
        let range =
            format_range(tournament.start_date_time, tournament.end_date_time);
        ListedTournament { tournament, range }
    }
}

/// `Dec 5, 2025 09:00–18:00` when both ends fall on one day, otherwise
/// `Dec 5, 2025 09:00 → Dec 6, 2025 18:00`.
pub fn format_range(start: NaiveDateTime, end: NaiveDateTime) -> String {
    const DATE: &str = "%b %-d, %Y";
    const TIME: &str = "%H:%M";

    if start.date() == end.date() {
        format!(
            "{} {}–{}",
            start.format(DATE),
            start.format(TIME),
            end.format(TIME)
        )
    } else {
        format!(
            "{} {} → {} {}",
            start.format(DATE),
            start.format(TIME),
            end.format(DATE),
            end.format(TIME)
        )
    }
}

/// Whether a free-text address looks like it lies in the given region: both
/// the state and the district have to appear in it, ignoring case. This is a
/// loose guess rather than a real lookup, and an empty state or district
/// never matches.
pub fn address_in_region(address: &str, state: &str, district: &str) -> bool {
    let address = address.to_lowercase();
    let (state, district) = (state.trim(), district.trim());
    !state.is_empty()
        && !district.is_empty()
        && address.contains(&state.to_lowercase())
        && address.contains(&district.to_lowercase())
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RegionFilter {
    pub state: Option<String>,
    pub district: Option<String>,
    pub status: Option<TournamentStatus>,
}

impl Tournament {
    /// Tournaments an official can review, soonest first. State and district
    /// are matched exactly when given; the status defaults to SUBMITTED.
    pub fn list_for_official(
        filter: &RegionFilter,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<ListedTournament>> {
        let status = filter.status.unwrap_or(TournamentStatus::Submitted);
        let mut query = tournaments::table
            .filter(tournaments::status.eq(status.as_str()))
            .order_by((tournaments::start_at.asc(), tournaments::id.asc()))
            .select(TournamentRow::as_select())
            .into_boxed();
        if let Some(state) = non_blank(filter.state.as_deref()) {
            query = query.filter(tournaments::state.eq(state.to_string()));
        }
        if let Some(district) = non_blank(filter.district.as_deref()) {
            query =
                query.filter(tournaments::district.eq(district.to_string()));
        }

        Ok(query
            .load::<TournamentRow>(conn)?
            .into_iter()
            .map(|row| ListedTournament::from(Tournament::from(row)))
            .collect())
    }

    /// What players in a region can see: published tournaments in exactly
    /// that state and district, soonest first.
    pub fn list_published_by_region(
        state: &str,
        district: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<ListedTournament>> {
        Ok(tournaments::table
            .filter(
                tournaments::status
                    .eq(TournamentStatus::Published.as_str())
                    .and(tournaments::state.eq(state))
                    .and(tournaments::district.eq(district)),
            )
            .order_by((tournaments::start_at.asc(), tournaments::id.asc()))
            .select(TournamentRow::as_select())
            .load::<TournamentRow>(conn)?
            .into_iter()
            .map(|row| ListedTournament::from(Tournament::from(row)))
            .collect())
    }

    /// Submitted tournaments that appear to be in the official's region,
    /// judging by their address. When the address is empty or matches
    /// nothing, every submitted tournament counts.
    pub fn count_submitted_near(
        address: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<usize> {
        let submitted: Vec<(String, String)> = tournaments::table
            .filter(
                tournaments::status.eq(TournamentStatus::Submitted.as_str()),
            )
            .select((tournaments::state, tournaments::district))
            .load(conn)?;

        if address.trim().is_empty() {
            return Ok(submitted.len());
        }
        let near = submitted
            .iter()
            .filter(|(state, district)| {
                address_in_region(address, state, district)
            })
            .count();
        Ok(if near == 0 { submitted.len() } else { near })
    }
}

pub async fn list_official_tournaments(
    user: User,
    mut conn: Conn<false>,
    WithRejection(Query(filter), _): QueryParams<RegionFilter>,
) -> StandardResponse<Vec<ListedTournament>> {
    user.check_role(Role::GovernmentOfficial)?;
    success(Tournament::list_for_official(&filter, &mut conn)?)
}

#[derive(Deserialize)]
pub struct RegionQuery {
    state: Option<String>,
    district: Option<String>,
}

/// Open to every signed-in user.
pub async fn list_published_tournaments(
    _user: User,
    mut conn: Conn<false>,
    WithRejection(Query(query), _): QueryParams<RegionQuery>,
) -> StandardResponse<Vec<ListedTournament>> {
    success(Tournament::list_published_by_region(
        query.state.as_deref().unwrap_or_default(),
        query.district.as_deref().unwrap_or_default(),
        &mut conn,
    )?)
}
