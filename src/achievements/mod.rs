//! Achievements that players submit and coaches verify.
//!
//! Rows written before achievements had a `status` column only carry a
//! `verified` value, either a boolean or a free-form string. Every read goes
//! through [`normalize_status`] so that callers only ever see a
//! [`ReviewStatus`].

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    review::{Decision, ReviewStatus},
    schema::{achievements, users},
    validation::non_blank,
};

pub mod submit;
pub mod verify;

/// The shape of the legacy `verified` field.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum LegacyVerified {
    Flag(bool),
    Text(String),
}

impl LegacyVerified {
    /// Reads the JSON stored in the `verified` column. Anything that is not
    /// valid JSON is taken to be a bare string.
    pub fn parse(raw: &str) -> LegacyVerified {
        serde_json::from_str(raw)
            .unwrap_or_else(|_| LegacyVerified::Text(raw.to_string()))
    }

    pub fn status(&self) -> ReviewStatus {
        match self {
            LegacyVerified::Flag(true) => ReviewStatus::Approved,
            LegacyVerified::Flag(false) => ReviewStatus::Pending,
            LegacyVerified::Text(s) => {
                match s.trim().to_ascii_uppercase().as_str() {
                    "APPROVED" => ReviewStatus::Approved,
                    "REJECTED" => ReviewStatus::Rejected,
                    _ => ReviewStatus::Pending,
                }
            }
        }
    }
}

pub fn normalize_status(
    status: Option<&str>,
    verified: Option<&str>,
) -> ReviewStatus {
    match (status, verified) {
        (Some(status), _) => status.parse().unwrap_or(ReviewStatus::Pending),
        (None, Some(verified)) => LegacyVerified::parse(verified).status(),
        (None, None) => ReviewStatus::Pending,
    }
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = achievements)]
#[diesel(check_for_backend(Sqlite))]
pub struct AchievementRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub achieved_on: NaiveDate,
    pub description: String,
    pub proof: String,
    pub sport: String,
    pub venue: String,
    pub status: Option<String>,
    pub verified: Option<String>,
    pub decision_reason: String,
    pub verified_by: Option<String>,
    pub verified_by_name: Option<String>,
    pub verified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    /// Opaque to the server (usually a data URL).
    pub proof: String,
    pub sport: String,
    pub venue: String,
    pub status: ReviewStatus,
    /// Mirror of `status == APPROVED` for older clients.
    pub verified: bool,
    pub decision_reason: String,
    pub verified_by: Option<String>,
    pub verified_by_name: Option<String>,
    pub verified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<AchievementRow> for Achievement {
    fn from(row: AchievementRow) -> Self {
        let status =
            normalize_status(row.status.as_deref(), row.verified.as_deref());
        Achievement {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            date: row.achieved_on,
            description: row.description,
            proof: row.proof,
            sport: row.sport,
            venue: row.venue,
            status,
            verified: status == ReviewStatus::Approved,
            decision_reason: row.decision_reason,
            verified_by: row.verified_by,
            verified_by_name: row.verified_by_name,
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The fields a player fills in when submitting an achievement.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewAchievement {
    pub title: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub description: Option<String>,
    pub proof: Option<String>,
    pub sport: Option<String>,
    pub venue: Option<String>,
}

/// A pending achievement together with who it belongs to.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PendingAchievement {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub owner: String,
    pub owner_id: String,
}

impl Achievement {
    #[tracing::instrument(skip(conn, fields))]
    pub fn submit(
        owner_id: &str,
        fields: NewAchievement,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Achievement> {
        let title = non_blank(fields.title.as_deref())
            .ok_or_else(|| WorkflowError::validation("title is required"))?;
        let sport = non_blank(fields.sport.as_deref())
            .ok_or_else(|| WorkflowError::validation("sport is required"))?;
        let venue = non_blank(fields.venue.as_deref())
            .ok_or_else(|| WorkflowError::validation("venue is required"))?;
        let date = non_blank(fields.date.as_deref())
            .ok_or_else(|| WorkflowError::validation("date is required"))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            WorkflowError::validation("date must be formatted as YYYY-MM-DD")
        })?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().naive_utc();

        diesel::insert_into(achievements::table)
            .values((
                achievements::id.eq(&id),
                achievements::user_id.eq(owner_id),
                achievements::title.eq(title),
                achievements::achieved_on.eq(date),
                achievements::description
                    .eq(fields.description.unwrap_or_default()),
                achievements::proof.eq(fields.proof.unwrap_or_default()),
                achievements::sport.eq(sport),
                achievements::venue.eq(venue),
                achievements::status.eq(ReviewStatus::Pending.as_str()),
                achievements::verified.eq("false"),
                achievements::decision_reason.eq(""),
                achievements::created_at.eq(now),
                achievements::updated_at.eq(now),
            ))
            .execute(conn)?;

        tracing::info!("achievement {id} submitted by {owner_id}");
        Achievement::fetch(owner_id, &id, conn)
    }

    pub fn fetch(
        owner_id: &str,
        achievement_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Achievement> {
        achievements::table
            .filter(
                achievements::id
                    .eq(achievement_id)
                    .and(achievements::user_id.eq(owner_id)),
            )
            .select(AchievementRow::as_select())
            .first::<AchievementRow>(conn)
            .optional()?
            .map(Achievement::from)
            .ok_or(WorkflowError::NotFound("achievement"))
    }

    /// The owner's achievements, newest first.
    pub fn list_for_owner(
        owner_id: &str,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<Achievement>> {
        Ok(achievements::table
            .filter(achievements::user_id.eq(owner_id))
            .order_by((
                achievements::created_at.desc(),
                achievements::id.desc(),
            ))
            .select(AchievementRow::as_select())
            .load::<AchievementRow>(conn)?
            .into_iter()
            .map(Achievement::from)
            .collect())
    }

    /// Every pending achievement across all users, optionally only those of
    /// one sport.
    pub fn list_pending(
        sport: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<PendingAchievement>> {
        let mut query = achievements::table
            .inner_join(users::table)
            .select((
                AchievementRow::as_select(),
                users::username,
                users::id,
            ))
            .order_by((achievements::created_at.asc(), achievements::id.asc()))
            .into_boxed();
        if let Some(sport) = sport {
            query = query.filter(achievements::sport.eq(sport));
        }

        Ok(query
            .load::<(AchievementRow, String, String)>(conn)?
            .into_iter()
            .map(|(row, owner, owner_id)| PendingAchievement {
                achievement: Achievement::from(row),
                owner,
                owner_id,
            })
            .filter(|p| p.achievement.status == ReviewStatus::Pending)
            .collect())
    }

    /// Records a reviewer's decision.
    ///
    /// A coach may only decide on achievements of their own sport; anyone
    /// else is refused with [`WorkflowError::Blocked`] and nothing is
    /// written. A coach whose sport is unset or blank is not restricted and
    /// may decide achievements of any sport. An achievement that has already
    /// been decided can be decided again, which overwrites the earlier
    /// decision.
    #[tracing::instrument(skip(conn, actor), fields(actor = %actor.id))]
    pub fn decide(
        owner_id: &str,
        achievement_id: &str,
        decision: Decision,
        actor: &User,
        reason: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<Achievement> {
        let target = Achievement::fetch(owner_id, achievement_id, conn)?;

        if actor.role() == Role::Coach
            && let Some(actor_sport) = non_blank(actor.sport.as_deref())
            && actor_sport != target.sport
        {
            tracing::warn!(
                "coach {} ({actor_sport}) may not decide on a {} achievement",
                actor.id,
                target.sport
            );
            return Err(WorkflowError::Blocked(format!(
                "coaches can only verify {actor_sport} achievements"
            )));
        }

        let status = ReviewStatus::from(decision);
        let reason = match decision {
            Decision::Rejected => reason.unwrap_or_default(),
            Decision::Approved => "",
        };
        let now = Utc::now().naive_utc();
        let verified = if status == ReviewStatus::Approved {
            "true"
        } else {
            "false"
        };

        diesel::update(achievements::table.find(&target.id))
            .set((
                achievements::status.eq(status.as_str()),
                achievements::verified.eq(verified),
                achievements::decision_reason.eq(reason),
                achievements::verified_by.eq(&actor.id),
                achievements::verified_by_name.eq(actor.display_name()),
                achievements::verified_at.eq(now),
                achievements::updated_at.eq(now),
            ))
            .execute(conn)?;

        tracing::info!("achievement {} is now {status}", target.id);
        Achievement::fetch(owner_id, achievement_id, conn)
    }

    /// Deletes one of the owner's achievements. Approved achievements are
    /// kept.
    #[tracing::instrument(skip(conn))]
    pub fn delete(
        owner_id: &str,
        achievement_id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<()> {
        let target = Achievement::fetch(owner_id, achievement_id, conn)?;
        if target.status == ReviewStatus::Approved {
            return Err(WorkflowError::Conflict(
                "approved achievements cannot be deleted".to_string(),
            ));
        }

        diesel::delete(achievements::table.find(&target.id)).execute(conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{conn, make_user};

    fn new_achievement(sport: &str) -> NewAchievement {
        NewAchievement {
            title: Some("District 100m".to_string()),
            date: Some("2025-08-14".to_string()),
            description: Some("First place".to_string()),
            proof: Some("data:image/jpeg;base64,AAAA".to_string()),
            sport: Some(sport.to_string()),
            venue: Some("Nehru Stadium".to_string()),
        }
    }

    fn submit(
        conn: &mut SqliteConnection,
        owner: &User,
        sport: &str,
    ) -> Achievement {
        Achievement::submit(&owner.id, new_achievement(sport), conn).unwrap()
    }

    #[test]
    fn legacy_verified_values_are_normalized() {
        use ReviewStatus::*;
        assert_eq!(normalize_status(None, Some("true")), Approved);
        assert_eq!(normalize_status(None, Some("false")), Pending);
        assert_eq!(
            normalize_status(None, Some("\"Rejected\"")),
            ReviewStatus::Rejected
        );
        assert_eq!(
            normalize_status(None, Some("\"approved\"")),
            ReviewStatus::Approved
        );
        assert_eq!(
            normalize_status(None, Some("\"maybe\"")),
            ReviewStatus::Pending
        );
        assert_eq!(normalize_status(None, Some("Rejected")), Rejected);
        assert_eq!(normalize_status(None, None), ReviewStatus::Pending);
        // an explicit status always wins over the legacy flag
        assert_eq!(
            normalize_status(Some("REJECTED"), Some("true")),
            ReviewStatus::Rejected
        );
    }

    #[test]
    fn legacy_rows_read_back_with_status() {
        let mut conn = conn();
        let player =
            make_user(&mut conn, "asha", Role::Player, Some("Athletics"));
        let now = Utc::now().naive_utc();

        let legacy = [("legacy-1", "true"), ("legacy-2", "\"Rejected\"")];
        for (id, verified) in legacy {
            diesel::insert_into(achievements::table)
                .values((
                    achievements::id.eq(id),
                    achievements::user_id.eq(&player.id),
                    achievements::title.eq("Old record"),
                    achievements::achieved_on
                        .eq(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()),
                    achievements::sport.eq("Athletics"),
                    achievements::venue.eq("Somewhere"),
                    achievements::verified.eq(verified),
                    achievements::created_at.eq(now),
                    achievements::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .unwrap();
        }

        let approved =
            Achievement::fetch(&player.id, "legacy-1", &mut conn).unwrap();
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert!(approved.verified);
        let rejected =
            Achievement::fetch(&player.id, "legacy-2", &mut conn).unwrap();
        assert_eq!(rejected.status, ReviewStatus::Rejected);

        // neither is pending, so neither shows up for review
        assert!(Achievement::list_pending(None, &mut conn).unwrap().is_empty());
    }

    #[test]
    fn submit_requires_fields() {
        let mut conn = conn();
        let player =
            make_user(&mut conn, "asha", Role::Player, Some("Athletics"));

        let mut missing_venue = new_achievement("Athletics");
        missing_venue.venue = Some("  ".to_string());
        assert!(matches!(
            Achievement::submit(&player.id, missing_venue, &mut conn),
            Err(WorkflowError::Validation(_))
        ));

        let mut bad_date = new_achievement("Athletics");
        bad_date.date = Some("14/08/2025".to_string());
        assert!(matches!(
            Achievement::submit(&player.id, bad_date, &mut conn),
            Err(WorkflowError::Validation(_))
        ));

        assert!(Achievement::list_for_owner(&player.id, &mut conn)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cross_sport_coach_cannot_decide() {
        let mut conn = conn();
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let coach =
            make_user(&mut conn, "coachf", Role::Coach, Some("Football"));

        let a = submit(&mut conn, &player, "Chess");
        assert_eq!(a.status, ReviewStatus::Pending);

        let res = Achievement::decide(
            &player.id,
            &a.id,
            Decision::Approved,
            &coach,
            None,
            &mut conn,
        );
        assert!(matches!(res, Err(WorkflowError::Blocked(_))));

        let after = Achievement::fetch(&player.id, &a.id, &mut conn).unwrap();
        assert_eq!(after, a);
    }

    #[test]
    fn coach_without_sport_can_decide_any_sport() {
        let mut conn = conn();
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let unset = make_user(&mut conn, "coachu", Role::Coach, None);
        let blank = make_user(&mut conn, "coachb", Role::Coach, Some("  "));

        let a = submit(&mut conn, &player, "Chess");
        let decided = Achievement::decide(
            &player.id,
            &a.id,
            Decision::Rejected,
            &unset,
            Some("blurry proof"),
            &mut conn,
        )
        .unwrap();
        assert_eq!(decided.status, ReviewStatus::Rejected);

        let decided = Achievement::decide(
            &player.id,
            &a.id,
            Decision::Approved,
            &blank,
            None,
            &mut conn,
        )
        .unwrap();
        assert_eq!(decided.status, ReviewStatus::Approved);
    }

    #[test]
    fn unknown_achievement_is_not_found() {
        let mut conn = conn();
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let coach = make_user(&mut conn, "coachc", Role::Coach, Some("Chess"));

        let res = Achievement::decide(
            &player.id,
            "nope",
            Decision::Approved,
            &coach,
            None,
            &mut conn,
        );
        assert!(matches!(res, Err(WorkflowError::NotFound(_))));
    }

    #[test]
    fn decisions_record_reviewer_and_can_be_revised() {
        let mut conn = conn();
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let coach = make_user(&mut conn, "coachc", Role::Coach, Some("Chess"));
        let a = submit(&mut conn, &player, "Chess");

        let rejected = Achievement::decide(
            &player.id,
            &a.id,
            Decision::Rejected,
            &coach,
            Some("Blurry certificate"),
            &mut conn,
        )
        .unwrap();
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        assert_eq!(rejected.decision_reason, "Blurry certificate");
        assert_eq!(rejected.verified_by.as_deref(), Some(coach.id.as_str()));
        assert_eq!(rejected.verified_by_name.as_deref(), Some("coachc"));
        assert!(!rejected.verified);

        let approved = Achievement::decide(
            &player.id,
            &a.id,
            Decision::Approved,
            &coach,
            Some("ignored"),
            &mut conn,
        )
        .unwrap();
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert_eq!(approved.decision_reason, "");
        assert!(approved.verified);
        assert!(approved.verified_at.is_some());
    }

    #[test]
    fn pending_list_filters_by_sport_and_tags_owner() {
        let mut conn = conn();
        let p1 = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let p2 = make_user(&mut conn, "ravi", Role::Player, Some("Football"));
        submit(&mut conn, &p1, "Chess");
        submit(&mut conn, &p2, "Football");

        let all = Achievement::list_pending(None, &mut conn).unwrap();
        assert_eq!(all.len(), 2);

        let chess =
            Achievement::list_pending(Some("Chess"), &mut conn).unwrap();
        assert_eq!(chess.len(), 1);
        assert_eq!(chess[0].owner, "asha");
        assert_eq!(chess[0].owner_id, p1.id);
    }

    #[test]
    fn approved_achievements_cannot_be_deleted() {
        let mut conn = conn();
        let player = make_user(&mut conn, "asha", Role::Player, Some("Chess"));
        let coach = make_user(&mut conn, "coachc", Role::Coach, Some("Chess"));
        let keep = submit(&mut conn, &player, "Chess");
        let drop = submit(&mut conn, &player, "Chess");

        Achievement::decide(
            &player.id,
            &keep.id,
            Decision::Approved,
            &coach,
            None,
            &mut conn,
        )
        .unwrap();

        assert!(matches!(
            Achievement::delete(&player.id, &keep.id, &mut conn),
            Err(WorkflowError::Conflict(_))
        ));
        Achievement::delete(&player.id, &drop.id, &mut conn).unwrap();

        let left = Achievement::list_for_owner(&player.id, &mut conn).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, keep.id);
    }
}
