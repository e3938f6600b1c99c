//! Webhook endpoint: subscription handshake, inbound deliveries and the
//! test echo used when wiring up a provider.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use switchboard_core::webhook::{DeliveryOutcome, Verification};

use crate::http::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhook - Subscription handshake. Echoes `hub.challenge` on success.
pub async fn verify_webhook(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    match state.webhooks.verify(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        Verification::Verified(challenge) => (StatusCode::OK, challenge).into_response(),
        Verification::Rejected => (StatusCode::FORBIDDEN, "Verification failed").into_response(),
    }
}

/// POST /webhook - Inbound delivery.
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes and parsed by the router.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match state.webhooks.handle_delivery(&body, signature).await {
        Ok(DeliveryOutcome::Processed(report)) => {
            tracing::debug!(
                stored = report.stored,
                duplicates = report.duplicates,
                skipped = report.skipped,
                unroutable = report.unroutable,
                durable_failures = report.durable_failures,
                delivered = report.delivered,
                "webhook delivery processed"
            );
        }
        Ok(DeliveryOutcome::Ignored(reason)) => {
            tracing::debug!(%reason, "webhook delivery ignored");
        }
        Err(e) => {
            tracing::warn!(error = %e, "webhook delivery rejected");
            return Err(e.into());
        }
    }

    Ok(Json(json!({ "status": "success" })))
}

/// POST /test-webhook - Log and echo a body without authenticating,
/// routing or storing it.
pub async fn test_webhook(headers: HeaderMap, body: Bytes) -> Json<serde_json::Value> {
    let data = serde_json::from_slice::<serde_json::Value>(&body).unwrap_or(serde_json::Value::Null);
    tracing::info!(
        headers = headers.len(),
        signed = headers.contains_key(SIGNATURE_HEADER),
        bytes = body.len(),
        "test webhook received"
    );
    tracing::debug!(%data, "test webhook body");

    Json(json!({ "status": "test webhook received", "data": data }))
}
