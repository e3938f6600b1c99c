//! Account management endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use switchboard_core::registry::AccountFilter;
use switchboard_types::account::{AccountPatch, CreateAccountRequest};

use crate::http::error::AppError;
use crate::http::response::Success;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET /api/accounts - Active accounts, or all with `?include_inactive=true`.
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Success<serde_json::Value> {
    let filter = if params.include_inactive {
        AccountFilter::All
    } else {
        AccountFilter::ActiveOnly
    };
    let accounts = state.registry.list(filter).await;

    Success::ok(json!({
        "accounts": accounts,
        "default_account_id": state.registry.default_account_id(),
    }))
}

/// POST /api/accounts (and the legacy /api/accounts/add) - Register an account.
pub async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Success<serde_json::Value>, AppError> {
    let Json(request) = body?;
    let mutation = state.registry.add(request.into_account()).await?;

    Ok(Success::created(json!({
        "account": mutation.value,
        "persisted": mutation.durability.is_durable(),
    })))
}

/// PUT /api/accounts/{id}/update - Merge the provided fields into an account.
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AccountPatch>, JsonRejection>,
) -> Result<Success<serde_json::Value>, AppError> {
    let Json(patch) = body?;
    let mutation = state.registry.update(&id, patch).await?;

    Ok(Success::ok(json!({
        "account": mutation.value,
        "persisted": mutation.durability.is_durable(),
    })))
}

/// DELETE /api/accounts/{id}/delete - Remove an account. The default account is protected.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Success<serde_json::Value>, AppError> {
    let mutation = state.registry.remove(&id).await?;

    Ok(Success::ok(json!({
        "message": format!("account '{}' deleted", mutation.value.id),
        "account_id": mutation.value.id,
    })))
}
