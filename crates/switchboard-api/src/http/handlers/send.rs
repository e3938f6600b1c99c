//! Outbound send endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use switchboard_core::send::SendRequest;
use switchboard_types::account::Account;
use switchboard_types::provider::{MessageKind, SendOutcome};

use crate::http::error::AppError;
use crate::http::response::Success;
use crate::state::AppState;

/// Request body for `POST /send` and `POST /api/accounts/{id}/send`.
#[derive(Debug, Default, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    pub account_id: Option<String>,
    pub business_id: Option<String>,
    pub phone_id: Option<String>,
}

/// Request body for `POST /send-template`.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateBody {
    #[serde(default)]
    pub to: String,
    pub account_id: Option<String>,
}

/// POST /send - Send from the account chosen by ids in the body, or the default.
pub async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<Success<serde_json::Value>, AppError> {
    let Json(body) = body?;
    let account = state
        .sender
        .resolve_sender(
            body.account_id.as_deref(),
            body.business_id.as_deref(),
            body.phone_id.as_deref(),
        )
        .await?;

    dispatch(&state, &account, SendRequest {
        to: body.to,
        text: body.message,
        kind: body.kind,
    })
    .await
}

/// POST /send-template - Send the configured template message.
pub async fn send_template(
    State(state): State<AppState>,
    body: Result<Json<TemplateBody>, JsonRejection>,
) -> Result<Success<serde_json::Value>, AppError> {
    let Json(body) = body?;
    let account = state
        .sender
        .resolve_sender(body.account_id.as_deref(), None, None)
        .await?;

    dispatch(&state, &account, SendRequest {
        to: body.to,
        text: String::new(),
        kind: MessageKind::Template,
    })
    .await
}

/// POST /api/accounts/{id}/send - Send from a specific account.
pub async fn send_from_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<Success<serde_json::Value>, AppError> {
    let Json(body) = body?;
    let account = state.sender.resolve_sender(Some(&account_id), None, None).await?;

    dispatch(&state, &account, SendRequest {
        to: body.to,
        text: body.message,
        kind: body.kind,
    })
    .await
}

async fn dispatch(
    state: &AppState,
    account: &Account,
    request: SendRequest,
) -> Result<Success<serde_json::Value>, AppError> {
    let report = state.sender.send_and_record(account, &request).await?;

    if let Some(receipt) = &report.receipt {
        tracing::debug!(
            account_id = %report.account_id,
            message_id = %receipt.message.id,
            durability = ?receipt.durability,
            "outgoing message recorded"
        );
    }

    match report.outcome {
        SendOutcome::Accepted {
            external_message_id,
            phone_number,
            account_id,
            raw_response,
        } => Ok(Success::ok(json!({
            "message_id": external_message_id,
            "phone_number": phone_number,
            "account_id": account_id,
            "delivery_info": raw_response,
        }))),
        SendOutcome::Failed {
            error_message,
            phone_number,
            raw_response,
        } => Err(AppError::SendFailed {
            message: error_message,
            phone_number,
            details: raw_response,
        }),
    }
}
