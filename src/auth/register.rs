use axum::Json;
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::Deserialize;

use crate::{
    auth::{PublicUser, User, hash_password, set_login_cookie},
    state::Conn,
    util_resp::{FailureResponse, JsonBody, SuccessResponse},
    validation::{is_valid_email, non_blank},
};

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn do_register(
    mut conn: Conn<true>,
    jar: PrivateCookieJar,
    WithRejection(Json(form), _): JsonBody<RegisterForm>,
) -> Result<(PrivateCookieJar, SuccessResponse<PublicUser>), FailureResponse>
{
    let (Some(username), Some(email), Some(password)) = (
        non_blank(form.username.as_deref()),
        non_blank(form.email.as_deref()),
        form.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(FailureResponse::BadRequest(
            "Missing required fields".to_string(),
        ));
    };

    User::validate_username(username).map_err(FailureResponse::BadRequest)?;
    is_valid_email(&email.to_lowercase()).map_err(FailureResponse::BadRequest)?;

    let password_hash = hash_password(password).map_err(|e| {
        tracing::error!("failed to hash password: {e}");
        FailureResponse::ServerError
    })?;

    let user = User::create(username, email, &password_hash, &mut conn)?;
    let jar = set_login_cookie(user.id.clone(), jar);

    Ok((jar, SuccessResponse::Created(PublicUser::from(user))))
}
