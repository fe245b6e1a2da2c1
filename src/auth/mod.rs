use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    schema::users,
    state::{DbPool, ThreadSafeConn},
    util_resp::FailureResponse,
};

pub mod login;
pub mod profile;
pub mod register;

pub const LOGIN_COOKIE: &str = "sid";

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Sqlite))]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub mobile: Option<String>,
    pub sport: Option<String>,
    pub profile_pic: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bloodgroup: Option<String>,
    pub address: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A user record without the credential hash; this is the only shape of a
/// user that leaves the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub mobile: Option<String>,
    pub sport: Option<String>,
    pub profile_pic: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bloodgroup: Option<String>,
    pub address: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        let role = user.role();
        PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            name: user.name,
            dob: user.dob,
            gender: user.gender,
            mobile: user.mobile,
            sport: user.sport,
            profile_pic: user.profile_pic,
            height: user.height,
            weight: user.weight,
            bloodgroup: user.bloodgroup,
            address: user.address,
            created_at: user.created_at,
        }
    }
}

impl User {
    pub fn validate_username(username: &str) -> Result<(), String> {
        crate::validation::is_ascii_no_spaces(username)
    }

    /// The name shown to other users: profile name, then username.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }

    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<User> {
        users::table
            .find(id)
            .select(User::as_select())
            .first::<User>(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("user"))
    }

    /// Finds a user whose email or username matches `identifier`, ignoring
    /// case and surrounding whitespace.
    pub fn find_by_identifier(
        identifier: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Option<User>> {
        let id_lower = identifier.trim().to_lowercase();
        users::table
            .filter(
                users::email
                    .eq(&id_lower)
                    .or(lower(users::username).eq(&id_lower)),
            )
            .select(User::as_select())
            .first::<User>(conn)
            .optional()
    }

    /// Creates a new account with the `Player` role. The email is stored
    /// lower-cased; both email and username must be unused.
    #[tracing::instrument(skip(conn, password_hash))]
    pub fn create(
        username: &str,
        email: &str,
        password_hash: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<User> {
        let email = email.trim().to_lowercase();
        let username = username.trim();

        let existing = users::table
            .filter(users::email.eq(&email).or(users::username.eq(username)))
            .select(User::as_select())
            .first::<User>(conn)
            .optional()?;
        if let Some(existing) = existing {
            let what = if existing.email == email {
                "email"
            } else {
                "username"
            };
            return Err(WorkflowError::Conflict(format!(
                "a user with that {what} already exists"
            )));
        }

        let id = Uuid::now_v7().to_string();
        let inserted = diesel::insert_into(users::table)
            .values((
                users::id.eq(&id),
                users::username.eq(username),
                users::email.eq(&email),
                users::password_hash.eq(password_hash),
                users::role.eq(Role::Player.as_str()),
                users::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn);

        match inserted {
            Ok(_) => {}
            // a concurrent signup won the race for the unique index
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => {
                return Err(WorkflowError::Conflict(
                    "a user with that email or username already exists"
                        .to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("registered user {id}");
        User::fetch(&id, conn)
    }

    /// Players, optionally restricted to one sport, ordered by username.
    pub fn list_players(
        sport: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<User>> {
        let mut query = users::table
            .filter(users::role.eq(Role::Player.as_str()))
            .select(User::as_select())
            .order_by(users::username.asc())
            .into_boxed();
        if let Some(sport) = sport {
            query = query.filter(users::sport.eq(sport));
        }
        query.load::<User>(conn)
    }
}

pub fn hash_password(
    password: &str,
) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct LoginSession {
    id: String,
    expiry: NaiveDateTime,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> =
            PrivateCookieJar::from_request_parts(parts, state)
                .await
                .map_err(|_| FailureResponse::Unauthorized)?;

        let login_cookie = match jar.get(LOGIN_COOKIE) {
            Some(cookie) => cookie,
            None => return Err(FailureResponse::Unauthorized),
        };

        let login: LoginSession =
            match serde_json::from_str::<LoginSession>(login_cookie.value()) {
                Ok(t) if Utc::now().naive_utc() < t.expiry => t,
                _ => {
                    return Err(FailureResponse::Unauthorized);
                }
            };

        let conn = ThreadSafeConn::from_request_parts(parts, state).await?;
        let mut conn = conn.inner.lock().await;

        match User::fetch(&login.id, &mut conn) {
            Ok(user) => Ok(user),
            Err(WorkflowError::NotFound(_)) => {
                Err(FailureResponse::NotFound("user not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn set_login_cookie(id: String, jar: PrivateCookieJar) -> PrivateCookieJar {
    let session = LoginSession {
        id,
        expiry: Utc::now()
            .naive_utc()
            .checked_add_days(Days::new(7))
            .unwrap_or(NaiveDateTime::MAX),
    };
    // serializing a string and a timestamp cannot fail
    let value = serde_json::to_string(&session).unwrap_or_default();

    let mut cookie = Cookie::new(LOGIN_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    jar.add(cookie)
}

pub fn clear_login_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    let mut cookie = Cookie::new(LOGIN_COOKIE, "");
    cookie.set_path("/");
    jar.remove(cookie)
}
