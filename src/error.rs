//! Failure values shared by all of the workflow operations.
//!
//! Business-rule outcomes (a record that does not exist, a guard that refused
//! the caller, a duplicate) are ordinary [`WorkflowError`] values so callers
//! can branch on them. Only [`WorkflowError::Database`] indicates that
//! something actually went wrong.

use thiserror::Error;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The actor is not allowed to make this change (for example a coach
    /// deciding on an achievement from another sport).
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("{0}")]
    Conflict(String),
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("database error")]
    Database(#[from] diesel::result::Error),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        WorkflowError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
