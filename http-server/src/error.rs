use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cross_matcher::{HistoryError, OrderError};
use serde_json::json;
use thiserror::Error;

/// Request-level failures, each reported to the calling client only
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Order(OrderError::InvalidSize | OrderError::InvalidPrice) => {
                (StatusCode::BAD_REQUEST, "INVALID_ORDER")
            }
            ApiError::Order(OrderError::NotFound(_)) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            ApiError::Order(OrderError::NotOwner(_)) => (StatusCode::FORBIDDEN, "NOT_OWNER"),
            ApiError::Order(OrderError::AlreadyExecuted(_)) => {
                (StatusCode::CONFLICT, "ALREADY_EXECUTED")
            }
            ApiError::History(_) => (StatusCode::BAD_REQUEST, "INVALID_MONTH"),
        };

        let body = Json(json!({
            "success": false,
            "error": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
