use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{api::Envelope, models::StatusMessage};

/// ApiError
///
/// Failures of a backend call. Each call fails at most once; nothing is retried.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend could not be reached or the reply could not be read.
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx reply that carried the backend's own envelope.
    #[error("{}", envelope_message(.envelope))]
    Backend { status: StatusCode, envelope: Envelope },

    /// Non-2xx reply without a JSON envelope.
    #[error("Request failed with status code {}", .status.as_u16())]
    Status { status: StatusCode },

    /// A 2xx reply whose body is not JSON, or a payload that could not be encoded.
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// CookieError
///
/// A session cookie that cannot be written into a `Set-Cookie` header.
#[derive(Error, Debug)]
pub enum CookieError {
    #[error("{0} contains characters not allowed in a cookie")]
    InvalidValue(String),
}

fn envelope_message(envelope: &Envelope) -> &str {
    envelope.message().unwrap_or("Backend rejected the request")
}

/// AppError
///
/// Errors surfaced by the HTTP handlers of this service.
#[derive(Error, Debug)]
pub enum AppError {
    /// A form failed client-side validation and was never sent.
    #[error("{0}")]
    Validation(String),

    #[error("Login required")]
    Unauthenticated,

    /// The backend answered 2xx but its envelope reports a failure.
    #[error("{}", envelope_message(.0))]
    Rejected(Envelope),

    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(message) => {
                status_message(StatusCode::BAD_REQUEST, message)
            }
            AppError::Cookie(err) => {
                tracing::warn!(error = %err, "session cookies not written");
                status_message(StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::Unauthenticated => {
                status_message(StatusCode::UNAUTHORIZED, "Login required".to_string())
            }
            AppError::Rejected(envelope) => {
                let status = envelope
                    .status()
                    .and_then(|code| u16::try_from(code).ok())
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .filter(|code| code.is_client_error() || code.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(envelope)).into_response()
            }
            AppError::Api(ApiError::Backend { status, envelope }) => {
                (status, Json(envelope)).into_response()
            }
            AppError::Api(ApiError::Status { status }) => {
                status_message(status, format!("Request failed with status code {}", status.as_u16()))
            }
            AppError::Api(err) => {
                tracing::error!(error = %err, "backend call failed");
                status_message(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

fn status_message(status: StatusCode, message: String) -> Response {
    let body = StatusMessage {
        status: status.as_u16(),
        message,
    };
    (status, Json(body)).into_response()
}
