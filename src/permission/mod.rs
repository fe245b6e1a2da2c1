use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{auth::User, util_resp::FailureResponse};

/// What a user is allowed to do in the portal. Stored as the display name
/// (e.g. `"Government Official"`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Player,
    Coach,
    Admin,
    #[serde(rename = "Government Official")]
    GovernmentOfficial,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "Player",
            Role::Coach => "Coach",
            Role::Admin => "Admin",
            Role::GovernmentOfficial => "Government Official",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Player" => Ok(Role::Player),
            "Coach" => Ok(Role::Coach),
            "Admin" => Ok(Role::Admin),
            "Government Official" | "GovernmentOfficial" => {
                Ok(Role::GovernmentOfficial)
            }
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

impl User {
    /// Anything unrecognised in the database is treated as a player, which is
    /// also what new accounts start as.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Player)
    }

    pub fn check_role(&self, role: Role) -> Result<(), FailureResponse> {
        if self.role() == role {
            Ok(())
        } else {
            tracing::debug!(
                "user {} has role {}, needed {role}",
                self.id,
                self.role()
            );
            Err(FailureResponse::Forbidden(format!(
                "this action is only available to the {role} role"
            )))
        }
    }
}

#[cfg(test)]
#[test]
fn test_role_names() {
    assert_eq!(
        "Government Official".parse::<Role>().unwrap(),
        Role::GovernmentOfficial
    );
    assert_eq!(
        serde_json::to_string(&Role::GovernmentOfficial).unwrap(),
        "\"Government Official\""
    );
    assert!("Referee".parse::<Role>().is_err());
}
