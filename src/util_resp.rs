use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde::Serialize;

use crate::error::WorkflowError;

pub type StandardResponse<T> = Result<SuccessResponse<T>, FailureResponse>;

/// A JSON request body whose parse failures are reported like every other
/// bad request.
pub type JsonBody<T> = WithRejection<Json<T>, FailureResponse>;
pub type QueryParams<T> = WithRejection<Query<T>, FailureResponse>;

pub fn success<T: Serialize>(body: T) -> StandardResponse<T> {
    Ok(SuccessResponse::Success(body))
}

pub fn created<T: Serialize>(body: T) -> StandardResponse<T> {
    Ok(SuccessResponse::Created(body))
}

pub fn bad_request<T>(msg: impl Into<String>) -> StandardResponse<T> {
    Err(FailureResponse::BadRequest(msg.into()))
}

pub enum SuccessResponse<T> {
    Success(T),
    Created(T),
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        match self {
            SuccessResponse::Success(body) => Json(body).into_response(),
            SuccessResponse::Created(body) => {
                (StatusCode::CREATED, Json(body)).into_response()
            }
        }
    }
}

#[derive(Debug)]
pub enum FailureResponse {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    ServerError,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for FailureResponse {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            FailureResponse::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            FailureResponse::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            FailureResponse::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            FailureResponse::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            FailureResponse::Conflict(msg) => (StatusCode::CONFLICT, msg),
            FailureResponse::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error".to_string(),
            ),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<WorkflowError> for FailureResponse {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(msg) => FailureResponse::BadRequest(msg),
            e @ WorkflowError::NotFound(_) => {
                FailureResponse::NotFound(e.to_string())
            }
            e @ WorkflowError::Blocked(_) => {
                FailureResponse::Forbidden(e.to_string())
            }
            WorkflowError::Conflict(msg) => FailureResponse::Conflict(msg),
            e @ WorkflowError::InvalidTransition { .. } => {
                FailureResponse::Conflict(e.to_string())
            }
            WorkflowError::Database(e) => {
                tracing::error!("database error: {e}");
                FailureResponse::ServerError
            }
        }
    }
}

impl From<JsonRejection> for FailureResponse {
    fn from(e: JsonRejection) -> Self {
        FailureResponse::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for FailureResponse {
    fn from(e: QueryRejection) -> Self {
        FailureResponse::BadRequest(e.body_text())
    }
}

impl From<diesel::result::Error> for FailureResponse {
    fn from(e: diesel::result::Error) -> Self {
        FailureResponse::from(WorkflowError::Database(e))
    }
}
