use axum::extract::Path;
use chrono::Utc;
use diesel::prelude::*;

use crate::{
    auth::User,
    error::WorkflowResult,
    permission::Role,
    schema::tournaments,
    state::Conn,
    tournaments::{Tournament, TournamentStatus},
    util_resp::{StandardResponse, success},
};

impl Tournament {
    /// Makes an approved tournament visible to players.
    #[tracing::instrument(skip(conn))]
    pub fn publish(
        tournament_id: &str,
        admin_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        let to = TournamentStatus::Published;
        let current = Tournament::fetch_for_transition(
            tournament_id,
            TournamentStatus::Approved,
            to,
            conn,
        )?;
        let now = Utc::now().naive_utc();

        diesel::update(tournaments::table.find(&current.id))
            .set((
                tournaments::status.eq(to.as_str()),
                tournaments::published_by.eq(admin_id),
                tournaments::published_at.eq(now),
                tournaments::updated_at.eq(now),
            ))
            .execute(conn)?;

        tracing::info!("tournament {tournament_id} published by {admin_id}");
        Tournament::fetch(tournament_id, conn)
    }

    /// Takes a published tournament back to APPROVED. The publish metadata
    /// is left in place.
    #[tracing::instrument(skip(conn))]
    pub fn unpublish(
        tournament_id: &str,
        admin_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Tournament> {
        let to = TournamentStatus::Approved;
        let current = Tournament::fetch_for_transition(
            tournament_id,
            TournamentStatus::Published,
            to,
            conn,
        )?;

        diesel::update(tournaments::table.find(&current.id))
            .set((
                tournaments::status.eq(to.as_str()),
                tournaments::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        tracing::info!("tournament {tournament_id} unpublished by {admin_id}");
        Tournament::fetch(tournament_id, conn)
    }
}

pub async fn do_publish_tournament(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
) -> StandardResponse<Tournament> {
    user.check_role(Role::Admin)?;
    Tournament::fetch(&tournament_id, &mut conn)?.check_owned_by(&user)?;
    success(Tournament::publish(&tournament_id, &user.id, &mut conn)?)
}

pub async fn do_unpublish_tournament(
    user: User,
    mut conn: Conn<true>,
    Path(tournament_id): Path<String>,
) -> StandardResponse<Tournament> {
    user.check_role(Role::Admin)?;
    Tournament::fetch(&tournament_id, &mut conn)?.check_owned_by(&user)?;
    success(Tournament::unpublish(&tournament_id, &user.id, &mut conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::WorkflowError,
        review::Decision,
        test::{conn, make_tournament, make_user},
    };

    #[test]
    fn publish_requires_approval() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);

        let submitted =
            make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);
        assert!(matches!(
            Tournament::publish(&submitted.id, &admin.id, &mut conn),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let rejected =
            make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);
        Tournament::review(
            &rejected.id,
            Decision::Rejected,
            None,
            &official.id,
            &mut conn,
        )
        .unwrap();
        assert!(
            Tournament::publish(&rejected.id, &admin.id, &mut conn).is_err()
        );

        Tournament::review(
            &submitted.id,
            Decision::Approved,
            None,
            &official.id,
            &mut conn,
        )
        .unwrap();
        let published =
            Tournament::publish(&submitted.id, &admin.id, &mut conn).unwrap();
        assert_eq!(published.status, TournamentStatus::Published);
        assert_eq!(published.published_by.as_deref(), Some(admin.id.as_str()));

        // publishing twice is refused and changes nothing
        assert!(
            Tournament::publish(&submitted.id, &admin.id, &mut conn).is_err()
        );
        assert_eq!(
            Tournament::fetch(&submitted.id, &mut conn).unwrap(),
            published
        );
    }

    #[test]
    fn unpublish_keeps_history() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);
        let t = make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);

        assert!(matches!(
            Tournament::unpublish(&t.id, &admin.id, &mut conn),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        Tournament::review(
            &t.id,
            Decision::Approved,
            None,
            &official.id,
            &mut conn,
        )
        .unwrap();
        let published =
            Tournament::publish(&t.id, &admin.id, &mut conn).unwrap();
        let unpublished =
            Tournament::unpublish(&t.id, &admin.id, &mut conn).unwrap();

        assert_eq!(unpublished.status, TournamentStatus::Approved);
        assert_eq!(unpublished.published_at, published.published_at);
        assert_eq!(unpublished.published_by, published.published_by);

        // and it can go out again
        Tournament::publish(&t.id, &admin.id, &mut conn).unwrap();
    }

    #[test]
    fn unpublished_tournaments_leave_the_regional_listing() {
        let mut conn = conn();
        let admin = make_user(&mut conn, "admin", Role::Admin, None);
        let official =
            make_user(&mut conn, "gov", Role::GovernmentOfficial, None);
        let t = make_tournament(&mut conn, &admin, "Kerala", "Kochi", false);
        Tournament::review(
            &t.id,
            Decision::Approved,
            None,
            &official.id,
            &mut conn,
        )
        .unwrap();

        let listed = |conn: &mut SqliteConnection| {
            Tournament::list_published_by_region("Kerala", "Kochi", conn)
                .unwrap()
                .into_iter()
                .map(|l| l.tournament.id)
                .collect::<Vec<_>>()
        };
        assert!(listed(&mut conn).is_empty());

        Tournament::publish(&t.id, &admin.id, &mut conn).unwrap();
        assert_eq!(listed(&mut conn), vec![t.id.clone()]);

        Tournament::unpublish(&t.id, &admin.id, &mut conn).unwrap();
        assert!(listed(&mut conn).is_empty());
    }
}
