use super::dto::ErrorResponse;
use crate::exchange::ExchangeError;
use crate::scalp::ControllerError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// API error type; renders as `{ "error": message }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ControllerError> for ApiError {
    fn from(e: ControllerError) -> Self {
        match e {
            ControllerError::PositionNotFound(_) => ApiError::not_found(e.to_string()),
            ControllerError::NotConnected
            | ControllerError::NotRunning
            | ControllerError::AlreadyRunning
            | ControllerError::InvalidConfig(_)
            | ControllerError::ExchangeMismatch { .. }
            | ControllerError::UntrackedSymbol(_) => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(e: ExchangeError) -> Self {
        match e {
            // Credential problems are the caller's to fix; surface them verbatim
            ExchangeError::Auth(message) => ApiError::bad_request(message),
            ExchangeError::NotConnected | ExchangeError::Unsupported(_) => {
                ApiError::bad_request(e.to_string())
            }
            ExchangeError::OrderRejected(_) => ApiError::bad_gateway(e.to_string()),
            _ => ApiError::internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
