use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod achievements;
pub mod auth;
pub mod config;
pub mod error;
pub mod import;
pub mod permission;
pub mod registrations;
pub mod reports;
pub mod review;
pub mod schedules;
pub mod schema;
pub mod state;
pub mod tournaments;
pub mod util_resp;
pub mod validation;

#[cfg(test)]
mod test;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
