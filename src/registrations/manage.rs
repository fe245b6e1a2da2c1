//! What the organising admin sees and does with a tournament's entrants.

use axum::{
    Json,
    extract::{Path, Query},
};
use axum_extra::extract::WithRejection;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    registrations::{Registration, RegistrationRow, RegistrationStatus},
    schema::{registrations, users},
    state::Conn,
    tournaments::Tournament,
    util_resp::{
        FailureResponse, JsonBody, QueryParams, StandardResponse, success,
    },
    validation::non_blank,
};

/// A registration flattened together with the player's profile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub sport: String,
    pub avatar: String,
    pub registered_at: NaiveDateTime,
    pub reg_status: RegistrationStatus,
    pub reg_decision_at: Option<NaiveDateTime>,
    pub reg_decision_by: Option<String>,
    pub reg_decision_reason: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterCounts {
    pub all: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RosterFilter {
    pub status: Option<RegistrationStatus>,
    /// Case-insensitive substring of the player's name or email.
    pub search: Option<String>,
}

impl RosterFilter {
    fn matches(&self, entry: &RosterEntry) -> bool {
        if let Some(status) = self.status
            && entry.reg_status != status
        {
            return false;
        }
        match non_blank(self.search.as_deref()) {
            Some(search) => {
                let search = search.to_lowercase();
                entry.name.to_lowercase().contains(&search)
                    || entry.email.to_lowercase().contains(&search)
            }
            None => true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub user_id: String,
    pub error: String,
}

/// Which registrations a bulk action changed, and which it could not.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

fn status_rank(status: RegistrationStatus) -> u8 {
    match status {
        RegistrationStatus::Pending => 0,
        RegistrationStatus::Confirmed => 1,
        RegistrationStatus::Rejected => 2,
    }
}

impl Registration {
    /// Sets the status of one player's registration. The reason is kept only
    /// for rejections; the decider and time are always recorded.
    #[tracing::instrument(skip(conn, reason))]
    pub fn set_status(
        player_id: &str,
        tournament_id: &str,
        status: RegistrationStatus,
        reason: Option<&str>,
        decider_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Registration> {
        let reg = Registration::find(player_id, tournament_id, conn)?
            .ok_or(WorkflowError::NotFound("registration"))?;

        let reason = match status {
            RegistrationStatus::Rejected => reason.unwrap_or_default().trim(),
            _ => "",
        };
        diesel::update(registrations::table.find(&reg.id))
            .set((
                registrations::status.eq(status.as_str()),
                registrations::decision_reason.eq(reason),
                registrations::decided_by.eq(decider_id),
                registrations::decided_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        tracing::info!(
            "registration of {player_id} for {tournament_id}: {} -> {status}",
            reg.reg_status
        );
        Registration::find(player_id, tournament_id, conn)?
            .ok_or(WorkflowError::NotFound("registration"))
    }

    /// Every player registered for the tournament, pending ones first and
    /// then newest first.
    pub fn list_for_tournament(
        tournament_id: &str,
        filter: &RosterFilter,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<RosterEntry>> {
        let rows = registrations::table
            .inner_join(users::table)
            .filter(registrations::tournament_id.eq(tournament_id))
            .filter(users::role.eq(Role::Player.as_str()))
            .select((
                RegistrationRow::as_select(),
                users::username,
                users::name,
                users::email,
                users::mobile,
                users::sport,
                users::profile_pic,
            ))
            .load::<(
                RegistrationRow,
                String,
                Option<String>,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
            )>(conn)?;

        Ok(rows
            .into_iter()
            .map(|(row, username, name, email, mobile, sport, avatar)| {
                let reg = Registration::from(row);
                RosterEntry {
                    user_id: reg.user_id,
                    name: name
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or(username),
                    email,
                    mobile: mobile.unwrap_or_default(),
                    sport: sport.unwrap_or_default(),
                    avatar: avatar.unwrap_or_default(),
                    registered_at: reg.registered_at,
                    reg_status: reg.reg_status,
                    reg_decision_at: reg.reg_decision_at,
                    reg_decision_by: reg.reg_decision_by,
                    reg_decision_reason: reg.reg_decision_reason,
                }
            })
            .filter(|entry| filter.matches(entry))
            .sorted_by(|a, b| {
                status_rank(a.reg_status)
                    .cmp(&status_rank(b.reg_status))
                    .then(b.registered_at.cmp(&a.registered_at))
            })
            .collect())
    }

    pub fn roster_counts(
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<RosterCounts> {
        let entries = Registration::list_for_tournament(
            tournament_id,
            &RosterFilter::default(),
            conn,
        )?;
        let by_status = entries.iter().counts_by(|e| e.reg_status);
        let count =
            |s: RegistrationStatus| by_status.get(&s).copied().unwrap_or(0);

        Ok(RosterCounts {
            all: entries.len(),
            pending: count(RegistrationStatus::Pending),
            confirmed: count(RegistrationStatus::Confirmed),
            rejected: count(RegistrationStatus::Rejected),
        })
    }

    /// Applies `status` to every pending registration that passes the search.
    /// Each registration is updated on its own: a failure is recorded and
    /// the rest carry on.
    fn bulk_decide(
        tournament_id: &str,
        search: Option<&str>,
        status: RegistrationStatus,
        reason: Option<&str>,
        decider_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<BulkOutcome> {
        let filter = RosterFilter {
            status: Some(RegistrationStatus::Pending),
            search: search.map(str::to_string),
        };
        let targets =
            Registration::list_for_tournament(tournament_id, &filter, conn)?;

        let mut outcome = BulkOutcome::default();
        for target in targets {
            match Registration::set_status(
                &target.user_id,
                tournament_id,
                status,
                reason,
                decider_id,
                conn,
            ) {
                Ok(_) => outcome.updated.push(target.user_id),
                Err(e) => {
                    tracing::warn!(
                        "bulk {status} of {} failed: {e}",
                        target.user_id
                    );
                    outcome.failed.push(BulkFailure {
                        user_id: target.user_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    pub fn bulk_approve(
        tournament_id: &str,
        search: Option<&str>,
        decider_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<BulkOutcome> {
        Registration::bulk_decide(
            tournament_id,
            search,
            RegistrationStatus::Confirmed,
            None,
            decider_id,
            conn,
        )
    }

    /// Rejects every matching pending registration with the same reason,
    /// which must not be blank.
    pub fn bulk_reject(
        tournament_id: &str,
        search: Option<&str>,
        reason: &str,
        decider_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<BulkOutcome> {
        let reason = non_blank(Some(reason)).ok_or_else(|| {
            WorkflowError::validation("a reason is required to reject")
        })?;
        Ok(Registration::bulk_decide(
            tournament_id,
            search,
            RegistrationStatus::Rejected,
            Some(reason),
            decider_id,
            conn,
        )?)
    }
}

/// Loads a tournament the admin created, or explains why they cannot touch
/// it.
fn owned_tournament(
    tournament_id: &str,
    admin: &User,
    conn: &mut SqliteConnection,
) -> Result<Tournament, FailureResponse> {
    admin.check_role(Role::Admin)?;
    let tournament = Tournament::fetch(tournament_id, conn)?;
    tournament.check_owned_by(admin)?;
    Ok(tournament)
}

#[derive(Serialize)]
pub struct Roster {
    registrations: Vec<RosterEntry>,
    counts: RosterCounts,
}

pub async fn tournament_roster(
    user: User,
    mut conn: Conn<false>,
    Path(tournament_id): Path<String>,
    WithRejection(Query(filter), _): QueryParams<RosterFilter>,
) -> StandardResponse<Roster> {
    let tournament = owned_tournament(&tournament_id, &user, &mut conn)?;
    success(Roster {
        registrations: Registration::list_for_tournament(
            &tournament.id,
            &filter,
            &mut conn,
        )?,
        counts: Registration::roster_counts(&tournament.id, &mut conn)?,
    })
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: RegistrationStatus,
    reason: Option<String>,
}

pub async fn do_set_registration_status(
    user: User,
    mut conn: Conn<true>,
    Path((tournament_id, player_id)): Path<(String, String)>,
    WithRejection(Json(form), _): JsonBody<StatusForm>,
) -> StandardResponse<Registration> {
    let tournament = owned_tournament(&tournament_id, &user, &mut conn)?;
    success(Registration::set_status(
        &player_id,
        &tournament.id,
        form.status,
        form.reason.as_deref(),
        &user.id,
        &mut conn,
    )?)
}

#[derive(Deserialize, Default)]
pub struct BulkApproveForm {
    search: Option<String>,
}

pub async fn do_bulk_approve(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
    WithRejection(Json(form), _): JsonBody<BulkApproveForm>,
) -> StandardResponse<BulkOutcome> {
    let tournament = owned_tournament(&tournament_id, &user, &mut conn)?;
    success(Registration::bulk_approve(
        &tournament.id,
        form.search.as_deref(),
        &user.id,
        &mut conn,
    )?)
}

#[derive(Deserialize)]
pub struct BulkRejectForm {
    reason: Option<String>,
    search: Option<String>,
}

pub async fn do_bulk_reject(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
    WithRejection(Json(form), _): JsonBody<BulkRejectForm>,
) -> StandardResponse<BulkOutcome> {
    let tournament = owned_tournament(&tournament_id, &user, &mut conn)?;
    success(Registration::bulk_reject(
        &tournament.id,
        form.search.as_deref(),
        form.reason.as_deref().unwrap_or_default(),
        &user.id,
        &mut conn,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::User,
        test::{conn, make_published_tournament, make_user},
    };

    fn set_name(conn: &mut SqliteConnection, user: &User, name: &str) {
        diesel::update(users::table.find(&user.id))
            .set(users::name.eq(name))
            .execute(conn)
            .unwrap();
    }

    #[test]
    fn confirming_shows_up_in_roster() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let t = make_published_tournament(&mut conn, &admin, true);

        let reg = Registration::register(&player.id, &t, &mut conn).unwrap();
        assert_eq!(reg.reg_status, RegistrationStatus::Pending);

        Registration::set_status(
            &player.id,
            &t.id,
            RegistrationStatus::Confirmed,
            Some("not kept"),
            &admin.id,
            &mut conn,
        )
        .unwrap();

        let roster =
            Registration::list_for_tournament(
                &t.id,
                &RosterFilter::default(),
                &mut conn,
            )
            .unwrap();
        assert_eq!(roster.len(), 1);
        let entry = &roster[0];
        assert_eq!(entry.reg_status, RegistrationStatus::Confirmed);
        assert_eq!(entry.reg_decision_by.as_deref(), Some(admin.id.as_str()));
        assert!(entry.reg_decision_at.is_some());
        assert_eq!(entry.reg_decision_reason, "");
        assert_eq!(entry.name, "asha");
        assert_eq!(entry.sport, "Chess");
    }

    #[test]
    fn set_status_on_missing_registration() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let player = make_user(&mut conn, "asha", Role::Player, None);
        let t = make_published_tournament(&mut conn, &admin, true);

        assert!(matches!(
            Registration::set_status(
                &player.id,
                &t.id,
                RegistrationStatus::Rejected,
                Some("no"),
                &admin.id,
                &mut conn,
            ),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn roster_filters_orders_and_counts() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let asha = make_user(&mut conn, "asha", Role::Player, None);
        let ravi = make_user(&mut conn, "ravi", Role::Player, None);
        let meera = make_user(&mut conn, "meera", Role::Player, None);
        set_name(&mut conn, &ravi, "Ravi Kumar");
        let t = make_published_tournament(&mut conn, &admin, true);

        for p in [&asha, &ravi, &meera] {
            Registration::register(&p.id, &t, &mut conn).unwrap();
        }
        Registration::set_status(
            &asha.id,
            &t.id,
            RegistrationStatus::Confirmed,
            None,
            &admin.id,
            &mut conn,
        )
        .unwrap();

        let all =
            Registration::list_for_tournament(
                &t.id,
                &RosterFilter::default(),
                &mut conn,
            )
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].user_id, asha.id);

        let search = RosterFilter {
            status: None,
            search: Some("KUMAR".to_string()),
        };
        let found =
            Registration::list_for_tournament(&t.id, &search, &mut conn)
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ravi Kumar");

        assert_eq!(
            Registration::roster_counts(&t.id, &mut conn).unwrap(),
            RosterCounts {
                all: 3,
                pending: 2,
                confirmed: 1,
                rejected: 0
            }
        );
    }

    #[test]
    fn bulk_reject_then_register_again() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let asha = make_user(&mut conn, "asha", Role::Player, None);
        let ravi = make_user(&mut conn, "ravi", Role::Player, None);
        let t = make_published_tournament(&mut conn, &admin, true);

        Registration::register(&asha.id, &t, &mut conn).unwrap();
        Registration::register(&ravi.id, &t, &mut conn).unwrap();

        assert!(matches!(
            Registration::bulk_reject(&t.id, None, "  ", &admin.id, &mut conn),
            Err(WorkflowError::Validation(_))
        ));

        let outcome =
            Registration::bulk_reject(
                &t.id,
                None,
                "Incomplete docs",
                &admin.id,
                &mut conn,
            )
            .unwrap();
        assert_eq!(outcome.updated.len(), 2);
        assert!(outcome.failed.is_empty());

        for p in [&asha, &ravi] {
            let reg =
                Registration::find(&p.id, &t.id, &mut conn).unwrap().unwrap();
            assert_eq!(reg.reg_status, RegistrationStatus::Rejected);
            assert_eq!(reg.reg_decision_reason, "Incomplete docs");
            assert!(!Registration::is_active(&p.id, &t.id, &mut conn).unwrap());
        }

        let again = Registration::register(&asha.id, &t, &mut conn).unwrap();
        assert_eq!(again.reg_status, RegistrationStatus::Pending);
        assert_eq!(again.reg_decision_reason, "");
        assert_eq!(
            Registration::roster_counts(&t.id, &mut conn).unwrap().all,
            2
        );
    }

    #[test]
    fn bulk_approve_only_touches_pending_matches() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let asha = make_user(&mut conn, "asha", Role::Player, None);
        let ravi = make_user(&mut conn, "ravi", Role::Player, None);
        let t = make_published_tournament(&mut conn, &admin, true);
        Registration::register(&asha.id, &t, &mut conn).unwrap();
        Registration::register(&ravi.id, &t, &mut conn).unwrap();
        Registration::set_status(
            &ravi.id,
            &t.id,
            RegistrationStatus::Rejected,
            Some("Late"),
            &admin.id,
            &mut conn,
        )
        .unwrap();

        let outcome =
            Registration::bulk_approve(&t.id, Some("ash"), &admin.id, &mut conn)
                .unwrap();
        assert_eq!(outcome.updated, vec![asha.id.clone()]);

        let ravi_reg =
            Registration::find(&ravi.id, &t.id, &mut conn).unwrap().unwrap();
        assert_eq!(ravi_reg.reg_status, RegistrationStatus::Rejected);
        assert_eq!(ravi_reg.reg_decision_reason, "Late");
    }
}
