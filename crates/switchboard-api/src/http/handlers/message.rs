//! Conversation history and contact list endpoints.
//!
//! The `/api/accounts/{id}/...` routes are account-scoped. The legacy
//! `/api/messages/{phone}` and `/api/contacts` routes take an optional
//! `account_id` query parameter and fall back to the default account.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use switchboard_core::phone;

use crate::http::error::AppError;
use crate::http::response::Success;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub account_id: Option<String>,
}

/// GET /api/accounts/{id}/messages/{phone}
pub async fn account_messages(
    State(state): State<AppState>,
    Path((account_id, raw_phone)): Path<(String, String)>,
) -> Result<Success<serde_json::Value>, AppError> {
    conversation(&state, account_id, &raw_phone).await
}

/// GET /api/accounts/{id}/contacts
pub async fn account_contacts(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Success<serde_json::Value>, AppError> {
    contacts(&state, account_id).await
}

/// GET /api/messages/{phone}?account_id=
pub async fn legacy_messages(
    State(state): State<AppState>,
    Path(raw_phone): Path<String>,
    Query(query): Query<AccountQuery>,
) -> Result<Success<serde_json::Value>, AppError> {
    let account_id = scoped_or_default(&state, query);
    conversation(&state, account_id, &raw_phone).await
}

/// GET /api/contacts?account_id=
pub async fn legacy_contacts(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Result<Success<serde_json::Value>, AppError> {
    let account_id = scoped_or_default(&state, query);
    contacts(&state, account_id).await
}

fn scoped_or_default(state: &AppState, query: AccountQuery) -> String {
    query
        .account_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| state.registry.default_account_id().to_string())
}

async fn conversation(
    state: &AppState,
    account_id: String,
    raw_phone: &str,
) -> Result<Success<serde_json::Value>, AppError> {
    state.registry.get(&account_id).await?;

    let phone_number = phone::normalize(raw_phone);
    if phone_number.is_empty() {
        return Err(AppError::Validation(format!("'{raw_phone}' is not a phone number")));
    }
    let messages = state.store.get(&account_id, &phone_number).await;

    Ok(Success::ok(json!({
        "account_id": account_id,
        "phone_number": phone_number,
        "messages": messages,
    })))
}

async fn contacts(state: &AppState, account_id: String) -> Result<Success<serde_json::Value>, AppError> {
    state.registry.get(&account_id).await?;
    let contacts = state.store.list_contacts(&account_id).await;

    Ok(Success::ok(json!({
        "account_id": account_id,
        "contacts": contacts,
    })))
}
