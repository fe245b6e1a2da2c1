//! Players asking to join a coach's session.

use axum::{
    Json,
    extract::{Path, Query},
};
use axum_extra::extract::WithRejection;
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    error::{WorkflowError, WorkflowResult},
    permission::Role,
    review::{Decision, ReviewStatus},
    schedules::Schedule,
    schema::schedule_requests,
    state::Conn,
    util_resp::{
        FailureResponse, JsonBody, QueryParams, StandardResponse, created,
        success,
    },
};

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = schedule_requests)]
#[diesel(check_for_backend(Sqlite))]
struct ScheduleRequestRow {
    id: String,
    schedule_id: String,
    player_id: String,
    status: String,
    message: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub id: String,
    pub schedule_id: String,
    pub player_id: String,
    pub status: ReviewStatus,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ScheduleRequestRow> for ScheduleRequest {
    fn from(row: ScheduleRequestRow) -> Self {
        ScheduleRequest {
            id: row.id,
            schedule_id: row.schedule_id,
            player_id: row.player_id,
            status: row.status.parse().unwrap_or(ReviewStatus::Pending),
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ScheduleRequest {
    #[tracing::instrument(skip(conn, message))]
    pub fn create(
        schedule_id: &str,
        player_id: &str,
        message: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<ScheduleRequest> {
        let schedule = Schedule::fetch(schedule_id, conn)?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().naive_utc();
        diesel::insert_into(schedule_requests::table)
            .values((
                schedule_requests::id.eq(&id),
                schedule_requests::schedule_id.eq(&schedule.id),
                schedule_requests::player_id.eq(player_id),
                schedule_requests::status.eq(ReviewStatus::Pending.as_str()),
                schedule_requests::message
                    .eq(message.map(str::trim).unwrap_or_default()),
                schedule_requests::created_at.eq(now),
                schedule_requests::updated_at.eq(now),
            ))
            .execute(conn)?;

        tracing::info!(
            "player {player_id} asked to join session {schedule_id}"
        );
        ScheduleRequest::fetch(&id, conn)
    }

    pub fn fetch(
        id: &str,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<ScheduleRequest> {
        schedule_requests::table
            .find(id)
            .select(ScheduleRequestRow::as_select())
            .first::<ScheduleRequestRow>(conn)
            .optional()?
            .map(ScheduleRequest::from)
            .ok_or(WorkflowError::NotFound("schedule request"))
    }

    /// Requests for one session with the given status (pending when none is
    /// given), oldest first.
    pub fn list(
        schedule_id: &str,
        status: Option<ReviewStatus>,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<ScheduleRequest>> {
        let status = status.unwrap_or(ReviewStatus::Pending);
        Ok(schedule_requests::table
            .filter(
                schedule_requests::schedule_id
                    .eq(schedule_id)
                    .and(schedule_requests::status.eq(status.as_str())),
            )
            .order_by((
                schedule_requests::created_at.asc(),
                schedule_requests::id.asc(),
            ))
            .select(ScheduleRequestRow::as_select())
            .load::<ScheduleRequestRow>(conn)?
            .into_iter()
            .map(ScheduleRequest::from)
            .collect())
    }

    /// Sets the outcome of a request. Whoever calls this is expected to have
    /// checked that they own the session.
    #[tracing::instrument(skip(conn))]
    pub fn decide(
        request_id: &str,
        decision: Decision,
        conn: &mut SqliteConnection,
    ) -> WorkflowResult<ScheduleRequest> {
        let updated = diesel::update(schedule_requests::table.find(request_id))
            .set((
                schedule_requests::status
                    .eq(ReviewStatus::from(decision).as_str()),
                schedule_requests::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(WorkflowError::NotFound("schedule request"));
        }

        tracing::info!("schedule request {request_id} is now {decision}");
        ScheduleRequest::fetch(request_id, conn)
    }
}

/// Loads a session and makes sure it belongs to `coach`.
fn owned_schedule(
    schedule_id: &str,
    coach: &User,
    conn: &mut SqliteConnection,
) -> Result<Schedule, FailureResponse> {
    let schedule = Schedule::fetch(schedule_id, conn)?;
    if schedule.coach_id != coach.id {
        return Err(FailureResponse::Forbidden(
            "this session belongs to another coach".to_string(),
        ));
    }
    Ok(schedule)
}

#[derive(Deserialize, Default)]
pub struct JoinForm {
    message: Option<String>,
}

pub async fn do_request_join(
    user: User,
    mut conn: Conn<true>,
    Path(schedule_id): Path<String>,
    WithRejection(Json(form), _): JsonBody<JoinForm>,
) -> StandardResponse<ScheduleRequest> {
    user.check_role(Role::Player)?;
    created(ScheduleRequest::create(
        &schedule_id,
        &user.id,
        form.message.as_deref(),
        &mut conn,
    )?)
}

#[derive(Deserialize)]
pub struct RequestsQuery {
    status: Option<ReviewStatus>,
}

pub async fn list_schedule_requests(
    user: User,
    mut conn: Conn<false>,
    Path(schedule_id): Path<String>,
    WithRejection(Query(query), _): QueryParams<RequestsQuery>,
) -> StandardResponse<Vec<ScheduleRequest>> {
    user.check_role(Role::Coach)?;
    let schedule = owned_schedule(&schedule_id, &user, &mut conn)?;

    success(ScheduleRequest::list(&schedule.id, query.status, &mut conn)?)
}

#[derive(Deserialize)]
pub struct RequestDecisionForm {
    decision: Decision,
}

pub async fn do_decide_request(
    user: User,
    mut conn: Conn<true>,
    Path(request_id): Path<String>,
    WithRejection(Json(form), _): JsonBody<RequestDecisionForm>,
) -> StandardResponse<ScheduleRequest> {
    user.check_role(Role::Coach)?;
    let request = ScheduleRequest::fetch(&request_id, &mut conn)?;
    owned_schedule(&request.schedule_id, &user, &mut conn)?;

    success(ScheduleRequest::decide(&request.id, form.decision, &mut conn)?)
}
