//! Status and health endpoints.

use axum::Json;
use axum::extract::State;
use serde_json::json;

use switchboard_core::registry::AccountFilter;

use crate::http::response::Success;
use crate::state::AppState;

/// GET /api/status - Accounts, store counts, signature enforcement and
/// live subscriber counts.
pub async fn get_status(State(state): State<AppState>) -> Success<serde_json::Value> {
    let accounts = state.registry.list(AccountFilter::All).await;
    let stats = state.store.stats().await;
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds().max(0);

    Success::ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "default_account_id": state.registry.default_account_id(),
        "accounts": accounts,
        "store": stats,
        "signature_enforced": state.webhooks.verifier().is_enforcing(),
        "realtime": {
            "rooms": state.fanout.room_count(),
            "subscriptions": state.fanout.subscription_count(),
            "update_subscribers": state.fanout.update_subscriber_count(),
        },
    }))
}

/// GET /health - Liveness check.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
