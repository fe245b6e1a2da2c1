use axum::Json;
use axum_extra::extract::WithRejection;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    schema::tournaments,
    state::Conn,
    tournaments::{
        Eligibility, Limits, Media, Organizer, Tournament, TournamentStatus,
        parse_timestamp,
    },
    util_resp::{JsonBody, StandardResponse, created, success},
    validation::{is_valid_mobile, non_blank},
};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewRegistrationRules {
    pub fee: Option<Decimal>,
    pub documents: Vec<String>,
    pub last_date: Option<String>,
}

/// What an admin fills in on the tournament wizard.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTournament {
    pub name: Option<String>,
    pub sport: Option<String>,
    pub venue: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub description: Option<String>,
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub eligibility: Eligibility,
    pub format: Option<String>,
    pub limits: Limits,
    pub registration: NewRegistrationRules,
    pub media: Media,
    pub organizer: Organizer,
    pub needs_approval: bool,
}

fn required<'a>(
    value: &'a Option<String>,
    what: &str,
) -> WorkflowResult<&'a str> {
    non_blank(value.as_deref()).ok_or_else(|| {
        WorkflowError::validation(format!("{what} is required"))
    })
}

fn required_timestamp(
    value: &Option<String>,
    what: &str,
) -> WorkflowResult<NaiveDateTime> {
    parse_timestamp(required(value, what)?).ok_or_else(|| {
        WorkflowError::validation(format!(
            "{what} is not a valid date and time"
        ))
    })
}

impl Tournament {
    /// Creates a tournament on behalf of `admin_id`. New tournaments go
    /// straight to review, so the initial status is always SUBMITTED.
    #[tracing::instrument(skip(conn, payload))]
    pub fn create(
        admin_id: &str,
        payload: NewTournament,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        let name = required(&payload.name, "name")?;
        let sport = required(&payload.sport, "sport")?;
        let venue = required(&payload.venue, "venue")?;
        let state = required(&payload.state, "state")?;
        let district = required(&payload.district, "district")?;
        let start = required_timestamp(&payload.start_date_time, "start")?;
        let end = required_timestamp(&payload.end_date_time, "end")?;

        if end <= start {
            return Err(WorkflowError::validation("end must be after start"));
        }

        let eligibility = &payload.eligibility;
        if let (Some(min), Some(max)) =
            (eligibility.age_min, eligibility.age_max)
            && min > max
        {
            return Err(WorkflowError::validation(
                "Age Min cannot exceed Age Max",
            ));
        }

        let last_date = payload.registration.last_date.as_deref();
        let last_date = match non_blank(last_date) {
            Some(raw) => {
                let last = parse_timestamp(raw).ok_or_else(|| {
                    WorkflowError::validation(
                        "registration last date is not a valid date",
                    )
                })?;
                if last.date() > start.date() {
                    return Err(WorkflowError::validation(
                        "Last date must be on/before start date",
                    ));
                }
                Some(last)
            }
            None => None,
        };

        let description =
            payload.description.as_deref().unwrap_or_default().trim();
        let organizer = &payload.organizer;
        let org_mobile = organizer.mobile.trim();
        if !org_mobile.is_empty() {
            is_valid_mobile(org_mobile).map_err(WorkflowError::Validation)?;
        }
        let org_email = organizer.email.trim();
        if !org_email.is_empty() && !org_email.contains('@') {
            return Err(WorkflowError::validation("Enter valid email"));
        }

        let gender = non_blank(eligibility.gender.as_deref()).unwrap_or("ANY");
        let format = non_blank(payload.format.as_deref()).unwrap_or("KNOCKOUT");
        let fee = payload.registration.fee.unwrap_or(Decimal::ZERO);
        if fee.is_sign_negative() {
            return Err(WorkflowError::validation(
                "registration fee cannot be negative",
            ));
        }
        let documents = serde_json::to_string(&payload.registration.documents)
            .map_err(|e| WorkflowError::validation(e.to_string()))?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().naive_utc();
        diesel::insert_into(tournaments::table)
            .values((
                (
                    tournaments::id.eq(&id),
                    tournaments::created_by.eq(admin_id),
                    tournaments::name.eq(name),
                    tournaments::sport.eq(sport),
                    tournaments::venue.eq(venue),
                    tournaments::state.eq(state),
                    tournaments::district.eq(district),
                    tournaments::description.eq(description),
                    tournaments::start_at.eq(start),
                    tournaments::end_at.eq(end),
                    tournaments::age_min.eq(eligibility.age_min),
                    tournaments::age_max.eq(eligibility.age_max),
                    tournaments::gender.eq(gender),
                    tournaments::district_restricted
                        .eq(eligibility.district_restricted),
                ),
                (
                    tournaments::format.eq(format),
                    tournaments::max_teams.eq(payload.limits.max_teams),
                    tournaments::max_players.eq(payload.limits.max_players),
                    tournaments::registration_fee.eq(fee.to_string()),
                    tournaments::registration_documents.eq(documents),
                    tournaments::registration_last_date.eq(last_date),
                    tournaments::banner.eq(&payload.media.banner),
                    tournaments::organizer_name.eq(organizer.name.trim()),
                    tournaments::organizer_mobile.eq(org_mobile),
                    tournaments::organizer_email.eq(org_email),
                    tournaments::needs_approval.eq(payload.needs_approval),
                    tournaments::status
                        .eq(TournamentStatus::Submitted.as_str()),
                    tournaments::created_at.eq(now),
                    tournaments::updated_at.eq(now),
                ),
            ))
            .execute(conn)?;

        tracing::info!("admin {admin_id} submitted tournament {id}");
        Tournament::fetch(&id, conn)
    }
}

pub async fn do_create_tournament(
    user: User,
    mut conn: Conn<true>,
    WithRejection(Json(payload), _): JsonBody<NewTournament>,
) -> StandardResponse<Tournament> {
    user.check_role(Role::Admin)?;
    created(Tournament::create(&user.id, payload, &mut conn)?)
}

pub async fn list_my_tournaments(
    user: User,
    mut conn: Conn<false>,
) -> StandardResponse<Vec<Tournament>> {
    user.check_role(Role::Admin)?;
    success(Tournament::list_created_by(&user.id, &mut conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{conn, make_user, tournament_payload};

    #[test]
    fn created_tournaments_await_review() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);

        let mut payload = tournament_payload("Kerala", "Kochi");
        payload.needs_approval = true;
        payload.registration.fee = Some(Decimal::new(25050, 2));
        payload.registration.documents = vec!["AADHAAR".to_string()];

        let t = Tournament::create(&admin.id, payload, &mut conn).unwrap();
        assert_eq!(t.status, TournamentStatus::Submitted);
        assert!(t.needs_approval);
        assert_eq!(t.created_by, admin.id);
        assert_eq!(t.format, "KNOCKOUT");
        assert_eq!(t.eligibility.gender.as_deref(), Some("ANY"));
        assert_eq!(t.registration.fee, Decimal::new(25050, 2));
        assert_eq!(t.registration.documents, vec!["AADHAAR".to_string()]);
    }

    #[test]
    fn missing_core_fields_are_rejected() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);

        let mut payload = tournament_payload("Kerala", "Kochi");
        payload.venue = None;
        assert!(matches!(
            Tournament::create(&admin.id, payload, &mut conn),
            Err(WorkflowError::Validation(_))
        ));

        let mut payload = tournament_payload("Kerala", "Kochi");
        payload.start_date_time = Some("soon".to_string());
        assert!(matches!(
            Tournament::create(&admin.id, payload, &mut conn),
            Err(WorkflowError::Validation(_))
        ));

        assert!(Tournament::list_created_by(&admin.id, &mut conn)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wizard_rules_are_enforced() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);

        let mut backwards = tournament_payload("Kerala", "Kochi");
        backwards.end_date_time = Some("2025-12-01T09:00".to_string());
        assert!(Tournament::create(&admin.id, backwards, &mut conn).is_err());

        let mut ages = tournament_payload("Kerala", "Kochi");
        ages.eligibility.age_min = Some(18);
        ages.eligibility.age_max = Some(12);
        assert!(Tournament::create(&admin.id, ages, &mut conn).is_err());

        let mut late = tournament_payload("Kerala", "Kochi");
        late.registration.last_date = Some("2025-12-06".to_string());
        assert!(Tournament::create(&admin.id, late, &mut conn).is_err());

        let mut on_the_day = tournament_payload("Kerala", "Kochi");
        on_the_day.registration.last_date = Some("2025-12-05".to_string());
        assert!(Tournament::create(&admin.id, on_the_day, &mut conn).is_ok());

        let mut mobile = tournament_payload("Kerala", "Kochi");
        mobile.organizer.mobile = "12345".to_string();
        assert!(Tournament::create(&admin.id, mobile, &mut conn).is_err());

        let mut email = tournament_payload("Kerala", "Kochi");
        email.organizer.email = "not-an-email".to_string();
        assert!(Tournament::create(&admin.id, email, &mut conn).is_err());
    }
}
