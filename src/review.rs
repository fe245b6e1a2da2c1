//! The pending/approved/rejected status shared by achievements and schedule
//! requests, and the decision a reviewer can make about them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReviewStatus::Pending),
            "APPROVED" => Ok(ReviewStatus::Approved),
            "REJECTED" => Ok(ReviewStatus::Rejected),
            _ => Err(format!("unknown status `{s}`")),
        }
    }
}

impl TryFrom<String> for ReviewStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The outcome a reviewer chooses. Deciding never moves a record back to
/// pending.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for ReviewStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => ReviewStatus::Approved,
            Decision::Rejected => ReviewStatus::Rejected,
        }
    }
}

/// Case-insensitive, like [`ReviewStatus`]. Only the two final outcomes are
/// accepted.
impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ReviewStatus>() {
            Ok(ReviewStatus::Approved) => Ok(Decision::Approved),
            Ok(ReviewStatus::Rejected) => Ok(Decision::Rejected),
            _ => Err(format!(
                "decision must be APPROVED or REJECTED, not `{s}`"
            )),
        }
    }
}

impl TryFrom<String> for Decision {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ReviewStatus::from(*self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_parse_in_any_case() {
        let d: Decision = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(d, Decision::Rejected);
        let s: ReviewStatus = serde_json::from_str("\" Pending \"").unwrap();
        assert_eq!(s, ReviewStatus::Pending);

        assert!(serde_json::from_str::<Decision>("\"PENDING\"").is_err());
        assert!(serde_json::from_str::<Decision>("\"maybe\"").is_err());
    }
}
