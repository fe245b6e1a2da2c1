use std::path::Path;

use axum::{
    Json, Router,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    r2d2::{ConnectionManager, Pool},
};
use diesel_migrations::MigrationHarness;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::{
    MIGRATIONS,
    achievements::{
        submit::{
            do_delete_achievement, do_submit_achievement, list_my_achievements,
        },
        verify::{do_decide_achievement, list_pending_achievements},
    },
    auth::{
        login::{do_login, do_logout},
        profile::{me, update_me},
        register::do_register,
    },
    registrations::{
        do_register_for_tournament, do_toggle_reminder, list_my_registrations,
        manage::{
            do_bulk_approve, do_bulk_reject, do_set_registration_status,
            tournament_roster,
        },
    },
    reports::routes::{coach_report, dashboard_badges, list_coach_players},
    schedules::{
        manage::{do_create_schedule, list_my_schedules},
        requests::{
            do_decide_request, do_request_join, list_schedule_requests,
        },
    },
    state::{AppState, DbPool, tx_commit},
    tournaments::{
        create::{do_create_tournament, list_my_tournaments},
        listing::{list_official_tournaments, list_published_tournaments},
        publish::{do_publish_tournament, do_unpublish_tournament},
        review::do_review_tournament,
    },
};

const MEMORY_DB: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("could not open database: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("could not run migrations: {0}")]
    Migrations(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// At least 64 bytes. Without one, sessions only last as long as the
    /// process.
    pub secret_key: Option<String>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: MEMORY_DB.to_string(),
            bind_addr: "127.0.0.1:3001".to_string(),
            secret_key: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Reads the optional TOML file, then lets the environment override it.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let settings = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Settings::default(),
        };
        Ok(settings.with_overrides(|name| std::env::var(name).ok()))
    }

    fn with_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Settings {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(secret) = var("SECRET_KEY") {
            self.secret_key = Some(secret);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn cookie_key(&self) -> Key {
        match self.secret_key.as_deref() {
            Some(secret) if secret.len() >= 64 => Key::from(secret.as_bytes()),
            Some(_) => {
                tracing::warn!(
                    "SECRET_KEY is shorter than 64 bytes, using a random key"
                );
                Key::generate()
            }
            None => {
                tracing::warn!(
                    "no SECRET_KEY set, sessions will not survive a restart"
                );
                Key::generate()
            }
        }
    }

    /// Opens the connection pool and brings the schema up to date.
    pub fn open_database(&self) -> Result<DbPool, ConfigError> {
        tracing::info!("using database {}", self.database_url);

        // every connection to `:memory:` is its own database
        let max_size = if self.database_url == MEMORY_DB { 1 } else { 10 };
        let pool: DbPool = Pool::builder()
            .max_size(max_size)
            .build(ConnectionManager::<SqliteConnection>::new(
                &self.database_url,
            ))?;

        run_migrations(&pool)?;
        Ok(pool)
    }
}

pub fn run_migrations(pool: &DbPool) -> Result<(), ConfigError> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ConfigError::Migrations(e.to_string()))?;
    for migration in applied {
        tracing::info!("applied migration {migration}");
    }
    Ok(())
}

#[derive(Serialize)]
struct Health {
    ok: bool,
}

async fn health() -> Json<Health> {
    Json(Health { ok: true })
}

pub fn create_app(pool: DbPool, key: Key) -> Router {
    let auth = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(do_register))
        .route("/api/auth/login", post(do_login))
        .route("/api/auth/logout", post(do_logout))
        .route("/api/me", get(me).patch(update_me));

    let achievements = Router::new()
        .route(
            "/api/achievements",
            get(list_my_achievements).post(do_submit_achievement),
        )
        .route("/api/achievements/pending", get(list_pending_achievements))
        .route(
            "/api/achievements/:id",
            axum::routing::delete(do_delete_achievement),
        )
        .route(
            "/api/achievements/:owner_id/:id/decision",
            post(do_decide_achievement),
        );

    let schedules = Router::new()
        .route(
            "/api/schedules",
            get(list_my_schedules).post(do_create_schedule),
        )
        .route(
            "/api/schedules/:id/requests",
            get(list_schedule_requests).post(do_request_join),
        )
        .route(
            "/api/schedule-requests/:id/decision",
            post(do_decide_request),
        );

    let tournaments = Router::new()
        .route("/api/tournaments", post(do_create_tournament))
        .route("/api/tournaments/mine", get(list_my_tournaments))
        .route("/api/tournaments/published", get(list_published_tournaments))
        .route("/api/official/tournaments", get(list_official_tournaments))
        .route("/api/tournaments/:id/review", post(do_review_tournament))
        .route("/api/tournaments/:id/publish", post(do_publish_tournament))
        .route(
            "/api/tournaments/:id/unpublish",
            post(do_unpublish_tournament),
        );

    let registrations = Router::new()
        .route(
            "/api/tournaments/:id/register",
            post(do_register_for_tournament),
        )
        .route("/api/registrations", get(list_my_registrations))
        .route(
            "/api/registrations/:tournament_id/reminder",
            post(do_toggle_reminder),
        )
        .route("/api/tournaments/:id/registrations", get(tournament_roster))
        .route(
            "/api/tournaments/:id/registrations/bulk-approve",
            post(do_bulk_approve),
        )
        .route(
            "/api/tournaments/:id/registrations/bulk-reject",
            post(do_bulk_reject),
        )
        .route(
            "/api/tournaments/:id/registrations/:user_id/status",
            post(do_set_registration_status),
        );

    let reports = Router::new()
        .route("/api/reports/coach", get(coach_report))
        .route("/api/dashboard", get(dashboard_badges))
        .route("/api/coach/players", get(list_coach_players));

    Router::new()
        .merge(auth)
        .merge(achievements)
        .merge(schedules)
        .merge(tournaments)
        .merge(registrations)
        .merge(reports)
        .layer(axum::middleware::from_fn(tx_commit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pool, key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_file() {
        let from_file: Settings = toml::from_str(
            r#"
            database_url = "portal.db"
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(from_file.bind_addr, "127.0.0.1:3001");

        let settings = from_file.with_overrides(|name| match name {
            "DATABASE_URL" => Some("other.db".to_string()),
            _ => None,
        });
        assert_eq!(settings.database_url, "other.db");
        assert_eq!(settings.log_level(), tracing::Level::DEBUG);
        assert_eq!(settings.secret_key, None);
    }

    #[test]
    fn long_secret_derives_a_stable_key() {
        let settings = Settings {
            secret_key: Some("k".repeat(64)),
            ..Settings::default()
        };
        assert_eq!(
            settings.cookie_key().master(),
            settings.cookie_key().master()
        );
    }
}
