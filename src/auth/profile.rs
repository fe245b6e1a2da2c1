use axum::Json;
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Deserializer};

use crate::{
    auth::{PublicUser, User},
    permission::Role,
    schema::users,
    state::Conn,
    util_resp::{JsonBody, StandardResponse, bad_request, success},
    validation::is_valid_mobile,
};

pub async fn me(user: User) -> StandardResponse<PublicUser> {
    success(PublicUser::from(user))
}

/// Distinguishes a field that was left out (`None`) from one explicitly set
/// to `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub dob: Option<Option<String>>,
    pub gender: Option<String>,
    pub mobile: Option<String>,
    pub role: Option<String>,
    pub sport: Option<String>,
    pub profile_pic: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub height: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub weight: Option<Option<f64>>,
    pub bloodgroup: Option<String>,
    pub address: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    name: Option<String>,
    dob: Option<Option<NaiveDate>>,
    gender: Option<String>,
    mobile: Option<String>,
    role: Option<String>,
    sport: Option<String>,
    profile_pic: Option<String>,
    height: Option<Option<f64>>,
    weight: Option<Option<f64>>,
    bloodgroup: Option<String>,
    address: Option<String>,
}

impl ProfileChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.dob.is_none()
            && self.gender.is_none()
            && self.mobile.is_none()
            && self.role.is_none()
            && self.sport.is_none()
            && self.profile_pic.is_none()
            && self.height.is_none()
            && self.weight.is_none()
            && self.bloodgroup.is_none()
            && self.address.is_none()
    }
}

impl ProfilePatch {
    /// Checks the patch and turns it into the set of columns to update.
    pub fn into_changes(self) -> Result<ProfileChanges, String> {
        if let Some(mobile) = self.mobile.as_deref()
            && !mobile.is_empty()
        {
            is_valid_mobile(mobile)?;
        }

        let role = match self.role.as_deref() {
            Some(role) => Some(role.parse::<Role>()?.as_str().to_string()),
            None => None,
        };

        let dob = match self.dob {
            Some(Some(dob)) if !dob.trim().is_empty() => Some(Some(
                NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d")
                    .map_err(|_| "dob must be formatted as YYYY-MM-DD")?,
            )),
            Some(_) => Some(None),
            None => None,
        };

        Ok(ProfileChanges {
            name: self.name,
            dob,
            gender: self.gender,
            mobile: self.mobile,
            role,
            sport: self.sport,
            profile_pic: self.profile_pic,
            height: self.height,
            weight: self.weight,
            bloodgroup: self.bloodgroup,
            address: self.address,
        })
    }
}

pub async fn update_me(
    user: User,
    mut conn: Conn<true>,
    WithRejection(Json(patch), _): JsonBody<ProfilePatch>,
) -> StandardResponse<PublicUser> {
    let changes = match patch.into_changes() {
        Ok(changes) => changes,
        Err(e) => return bad_request(e),
    };

    if !changes.is_empty() {
        diesel::update(users::table.find(&user.id))
            .set(&changes)
            .execute(&mut *conn)?;
        tracing::info!("updated profile of {}", user.id);
    }

    let user = User::fetch(&user.id, &mut conn)?;
    success(PublicUser::from(user))
}
