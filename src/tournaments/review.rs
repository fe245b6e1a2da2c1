use axum::{Json, extract::Path};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;

use crate::{
    auth::User,
    error::WorkflowResult,
    permission::Role,
    review::Decision,
    schema::tournaments,
    state::Conn,
    tournaments::{Tournament, TournamentStatus},
    util_resp::{JsonBody, StandardResponse, success},
};

impl From<Decision> for TournamentStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => TournamentStatus::Approved,
            Decision::Rejected => TournamentStatus::Rejected,
        }
    }
}

impl Tournament {
    /// An official's verdict on a submitted tournament. The note is stored
    /// as given, even when rejecting without one.
    #[tracing::instrument(skip(conn, note))]
    pub fn review(
        tournament_id: &str,
        decision: Decision,
        note: Option<&str>,
        official_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        let to = TournamentStatus::from(decision);
        let current = Tournament::fetch_for_transition(
            tournament_id,
            TournamentStatus::Submitted,
            to,
            conn,
        )?;
        let now = Utc::now().naive_utc();

        diesel::update(tournaments::table.find(&current.id))
            .set((
                tournaments::status.eq(to.as_str()),
                tournaments::reviewed_by.eq(official_id),
                tournaments::reviewed_at.eq(now),
                tournaments::review_note.eq(note.unwrap_or_default()),
                tournaments::updated_at.eq(now),
            ))
            .execute(conn)?;

        tracing::info!(
            "tournament {tournament_id}: {} -> {to}",
            current.status
        );
        Tournament::fetch(tournament_id, conn)
    }
}

#[derive(Deserialize)]
pub struct ReviewForm {
    decision: Decision,
    note: Option<String>,
}

pub async fn do_review_tournament(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
    WithRejection(Json(form), _): JsonBody<ReviewForm>,
) -> StandardResponse<Tournament> {
    user.check_role(Role::GovernmentOfficial)?;
    success(Tournament::review(
        &tournament_id,
        form.decision,
        form.note.as_deref(),
        &user.id,
        &mut conn,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::WorkflowError,
        test::{conn, make_tournament, make_user},
    };

    #[test]
    fn review_records_reviewer() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);
        let t = make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);

        let reviewed = Tournament::review(
            &t.id,
            Decision::Rejected,
            Some("Venue unavailable"),
            &official.id,
            &mut conn,
        )
        .unwrap();
        assert_eq!(reviewed.status, TournamentStatus::Rejected);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some(official.id.as_str()));
        assert_eq!(reviewed.review_note, "Venue unavailable");
        assert!(reviewed.reviewed_at.is_some());
    }

    #[test]
    fn only_submitted_tournaments_can_be_reviewed() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);
        let t = make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);

        Tournament::review(
            &t.id,
            Decision::Rejected,
            None,
            &official.id,
            &mut conn,
        )
        .unwrap();

        // rejection is final
        let again = Tournament::review(
            &t.id,
            Decision::Approved,
            None,
            &official.id,
            &mut conn,
        );
        assert!(matches!(again, Err(WorkflowError::InvalidTransition { .. })));
        assert_eq!(
            Tournament::fetch(&t.id, &mut conn).unwrap().status,
            TournamentStatus::Rejected
        );

        let missing = Tournament::review(
            "nope",
            Decision::Approved,
            None,
            &official.id,
            &mut conn,
        );
        assert!(matches!(missing, Err(WorkflowError::NotFound(_))));
    }
}
