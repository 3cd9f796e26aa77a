use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use opening_leaks::{FetchError, LeakError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::UserNotFound(user) => AppError::NotFound(format!("User not found: {user}")),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<LeakError> for AppError {
    fn from(err: LeakError) -> Self {
        match err {
            LeakError::InvalidConfig(msg) => AppError::BadRequest(msg),
            LeakError::Fetch(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
