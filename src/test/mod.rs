//! Fixtures shared by the unit tests, and whole-app tests that go through
//! the HTTP router.

use diesel::prelude::*;
use diesel_migrations::MigrationHarness;

use crate::{
    MIGRATIONS,
    auth::User,
    permission::Role,
    schema::{tournaments, users},
    tournaments::{
        Organizer, Tournament, TournamentStatus, create::NewTournament,
    },
};


/// A fresh in-memory database with the schema applied.
pub fn conn() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    conn
}

/// Creates `username` (with email `{username}@example.com`) and gives it
/// `role`. The password hash is not a real one, so these users cannot log
/// in.
pub fn make_user(
    conn: &mut SqliteConnection,
    username: &str,
    role: Role,
    sport: Option<&str>,
) -> User {
    let user =
        User::create(username, &format!("{username}@example.com"), "x", conn)
            .unwrap();
    diesel::update(users::table.find(&user.id))
        .set((users::role.eq(role.as_str()), users::sport.eq(sport)))
        .execute(conn)
        .unwrap();
    User::fetch(&user.id, conn).unwrap()
}

pub fn tournament_payload(state: &str, district: &str) -> NewTournament {
    NewTournament {
        name: Some(format!("{district} Open")),
        sport: Some("Chess".to_string()),
        venue: Some("Town Hall".to_string()),
        state: Some(state.to_string()),
        district: Some(district.to_string()),
        description: Some("Rapid, 15+10".to_string()),
        start_date_time: Some("2025-12-05T09:00".to_string()),
        end_date_time: Some("2025-12-06T18:00".to_string()),
        organizer: Organizer {
            name: "District Chess Association".to_string(),
            mobile: "9876543210".to_string(),
            email: "dca@example.com".to_string(),
        },
        ..NewTournament::default()
    }
}

/// A submitted tournament created by `admin`.
pub fn make_tournament(
    conn: &mut SqliteConnection,
    admin: &User,
    state: &str,
    district: &str,
    needs_approval: bool,
) -> Tournament {
    let mut payload = tournament_payload(state, district);
    payload.needs_approval = needs_approval;
    Tournament::create(&admin.id, payload, conn).unwrap()
}

/// A tournament that skipped review and is open for registration.
pub fn make_published_tournament(
    conn: &mut SqliteConnection,
    admin: &User,
    needs_approval: bool,
) -> Tournament {
    let t = make_tournament(conn, admin, "Kerala", "Kochi", needs_approval);
    diesel::update(tournaments::table.find(&t.id))
        .set(tournaments::status.eq(TournamentStatus::Published.as_str()))
        .execute(conn)
        .unwrap();
    Tournament::fetch(&t.id, conn).unwrap()
}
