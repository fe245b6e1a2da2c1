use axum::Json;
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{
        PublicUser, User, clear_login_cookie, set_login_cookie, verify_password,
    },
    state::Conn,
    util_resp::{FailureResponse, JsonBody, SuccessResponse},
};

#[derive(Deserialize)]
pub struct LoginForm {
    identifier: Option<String>,
    password: Option<String>,
}

pub async fn do_login(
    mut conn: Conn<true>,
    jar: PrivateCookieJar,
    WithRejection(Json(form), _): JsonBody<LoginForm>,
) -> Result<(PrivateCookieJar, SuccessResponse<PublicUser>), FailureResponse>
{
    let (Some(identifier), Some(password)) =
        (form.identifier.as_deref(), form.password.as_deref())
    else {
        return Err(FailureResponse::BadRequest(
            "Missing credentials".to_string(),
        ));
    };

    let user = match User::find_by_identifier(identifier, &mut conn)? {
        Some(user) => user,
        None => return Err(FailureResponse::Unauthorized),
    };

    if !verify_password(password, &user.password_hash) {
        // todo: password rate limiting
        tracing::debug!("wrong password for {}", user.id);
        return Err(FailureResponse::Unauthorized);
    }

    let jar = set_login_cookie(user.id.clone(), jar);
    Ok((jar, SuccessResponse::Success(PublicUser::from(user))))
}

#[derive(Serialize)]
pub struct LoggedOut {
    ok: bool,
}

pub async fn do_logout(
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, SuccessResponse<LoggedOut>) {
    (
        clear_login_cookie(jar),
        SuccessResponse::Success(LoggedOut { ok: true }),
    )
}
