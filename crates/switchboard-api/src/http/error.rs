//! Application error type mapping to HTTP status codes and the
//! `{"status":"error","message":...}` body.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use switchboard_types::error::{RegistryError, SendError, StoreError, WebhookError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Registry(RegistryError),
    Webhook(WebhookError),
    Store(StoreError),
    /// The provider refused or could not be reached.
    SendFailed {
        message: String,
        phone_number: String,
        details: Option<serde_json::Value>,
    },
    /// Validation error.
    Validation(String),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        AppError::Registry(e)
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Webhook(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<SendError> for AppError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::InvalidAccount(e) => AppError::Registry(e),
            SendError::InvalidRequest(msg) => AppError::Validation(msg),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Registry(RegistryError::AccountNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Registry(RegistryError::AccountInactive(_)) => StatusCode::BAD_REQUEST,
            AppError::Registry(RegistryError::DuplicateAccount(_)) => StatusCode::CONFLICT,
            AppError::Registry(RegistryError::ProtectedAccount(_)) => StatusCode::FORBIDDEN,
            AppError::Registry(RegistryError::Invalid(_)) => StatusCode::BAD_REQUEST,
            AppError::Registry(RegistryError::Unroutable(_)) => StatusCode::BAD_REQUEST,
            AppError::Webhook(WebhookError::SignatureInvalid) => StatusCode::FORBIDDEN,
            AppError::Webhook(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(StoreError::InvalidPhone(_)) => StatusCode::BAD_REQUEST,
            AppError::SendFailed { .. } | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::SendFailed {
                message,
                phone_number,
                details,
            } => {
                let mut body = json!({
                    "status": "error",
                    "message": message,
                    "phone_number": phone_number,
                });
                if let Some(details) = details {
                    body["details"] = details;
                }
                body
            }
            other => {
                let message = match other {
                    AppError::Registry(e) => e.to_string(),
                    AppError::Webhook(e) => e.to_string(),
                    AppError::Store(e) => e.to_string(),
                    AppError::Validation(msg) => msg,
                    AppError::SendFailed { message, .. } => message,
                };
                if status.is_server_error() {
                    tracing::error!(status = status.as_u16(), error = %message, "request failed");
                }
                json!({ "status": "error", "message": message })
            }
        };

        (status, Json(body)).into_response()
    }
}
