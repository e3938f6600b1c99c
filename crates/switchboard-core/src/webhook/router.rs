//! Inbound delivery handling.
//!
//! Authenticates a delivery, attributes each change to an account, and
//! stores and publishes every text message it carries. Nothing is ever sent
//! from here.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use switchboard_types::error::{RegistryError, WebhookError};
use switchboard_types::message::Direction;
use switchboard_types::webhook::{MessagesValue, WebhookPayload};

use crate::event::EventFanout;
use crate::registry::AccountRegistry;
use crate::storage::{Durability, KvStore};
use crate::store::{MessageStore, NewMessage};
use crate::webhook::signature::SignatureVerifier;

/// Outcome of a subscription handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back.
    Verified(String),
    Rejected,
}

/// Answer a `hub.mode` / `hub.verify_token` / `hub.challenge` handshake.
pub fn verify_subscription(
    expected_token: &str,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Verification {
    match (mode, token) {
        (Some("subscribe"), Some(token)) if token == expected_token => {
            Verification::Verified(challenge.unwrap_or_default().to_string())
        }
        _ => Verification::Rejected,
    }
}

/// Per-delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeliveryReport {
    pub stored: usize,
    pub duplicates: usize,
    /// Non-text messages and messages without a usable sender.
    pub skipped: usize,
    /// Messages dropped because their change matched no account.
    pub unroutable: usize,
    /// Stored in memory only.
    pub durable_failures: usize,
    /// Viewer mailboxes that received an event.
    pub delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Processed(DeliveryReport),
    /// Not JSON or not tagged for this relay. Acknowledged and dropped.
    Ignored(String),
}

pub struct WebhookRouter<K: KvStore> {
    registry: Arc<AccountRegistry<K>>,
    store: Arc<MessageStore<K>>,
    fanout: Arc<EventFanout>,
    verifier: SignatureVerifier,
    verify_token: String,
    object_tag: String,
}

impl<K: KvStore> WebhookRouter<K> {
    pub fn new(
        registry: Arc<AccountRegistry<K>>,
        store: Arc<MessageStore<K>>,
        fanout: Arc<EventFanout>,
        verifier: SignatureVerifier,
        verify_token: impl Into<String>,
        object_tag: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            fanout,
            verifier,
            verify_token: verify_token.into(),
            object_tag: object_tag.into(),
        }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn verify(&self, mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> Verification {
        let outcome = verify_subscription(&self.verify_token, mode, token, challenge);
        match &outcome {
            Verification::Verified(_) => tracing::info!("webhook subscription verified"),
            Verification::Rejected => tracing::warn!(?mode, "webhook verification failed"),
        }
        outcome
    }

    /// Handle one POSTed delivery.
    ///
    /// Returns `SignatureInvalid` before touching the body when the signature
    /// does not match, and `Processing` when a correctly tagged payload is
    /// structurally invalid. In the latter case nothing is stored.
    pub async fn handle_delivery(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DeliveryOutcome, WebhookError> {
        if !self.verifier.verify(body, signature).is_accepted() {
            return Err(WebhookError::SignatureInvalid);
        }

        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring non-JSON delivery");
                return Ok(DeliveryOutcome::Ignored("body is not JSON".to_string()));
            }
        };

        let object = value.get("object").and_then(|o| o.as_str()).unwrap_or_default();
        if object != self.object_tag {
            tracing::debug!(object, "ignoring delivery for another object type");
            return Ok(DeliveryOutcome::Ignored(format!("unexpected object '{object}'")));
        }

        let changes = parse_message_changes(value)?;
        let mut report = DeliveryReport::default();
        for change in changes {
            self.process_change(change, &mut report).await;
        }

        tracing::info!(
            stored = report.stored,
            duplicates = report.duplicates,
            skipped = report.skipped,
            unroutable = report.unroutable,
            "webhook delivery processed"
        );
        Ok(DeliveryOutcome::Processed(report))
    }

    async fn process_change(&self, change: MessagesValue, report: &mut DeliveryReport) {
        let phone_id = change.metadata.phone_number_id.as_str();
        let account_id = match self.registry.resolve_by_phone_id(phone_id).await {
            Ok(id) => id,
            Err(RegistryError::Unroutable(_)) => {
                tracing::warn!(
                    phone_number_id = %phone_id,
                    messages = change.messages.len(),
                    "unroutable change skipped"
                );
                report.unroutable += change.messages.len();
                return;
            }
            Err(e) => {
                tracing::error!(phone_number_id = %phone_id, error = %e, "account resolution failed");
                report.unroutable += change.messages.len();
                return;
            }
        };

        for inbound in change.messages {
            let Some(text) = inbound.text_body() else {
                tracing::info!(account_id = %account_id, kind = %inbound.kind, "non-text message skipped");
                report.skipped += 1;
                continue;
            };

            let new = NewMessage::new(account_id.clone(), inbound.from.clone(), text, Direction::Incoming)
                .with_external_id(inbound.id.clone())
                .with_timestamp(inbound.timestamp.as_deref().and_then(parse_unix_seconds));

            match self.store.append_and_publish(new, &self.fanout).await {
                Ok(receipt) if receipt.duplicate => report.duplicates += 1,
                Ok(receipt) => {
                    report.stored += 1;
                    if matches!(receipt.durability, Durability::MemoryOnly(_)) {
                        report.durable_failures += 1;
                    }
                    if let Some(fanout) = receipt.fanout {
                        report.delivered += fanout.delivered;
                    }
                    tracing::info!(
                        account_id = %account_id,
                        phone = %receipt.message.phone_number,
                        message_id = %receipt.message.id,
                        "incoming message stored"
                    );
                }
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "incoming message skipped");
                    report.skipped += 1;
                }
            }
        }
    }
}

/// Decode every `messages` change up front so a malformed payload stores nothing.
fn parse_message_changes(value: serde_json::Value) -> Result<Vec<MessagesValue>, WebhookError> {
    let payload: WebhookPayload =
        serde_json::from_value(value).map_err(|e| WebhookError::Processing(e.to_string()))?;

    let mut changes = Vec::new();
    for entry in payload.entry {
        for change in entry.changes.into_iter().filter(|c| c.field == "messages") {
            let decoded: MessagesValue = serde_json::from_value(change.value).map_err(|e| {
                WebhookError::Processing(format!("invalid change in entry '{}': {e}", entry.id))
            })?;
            changes.push(decoded);
        }
    }
    Ok(changes)
}

fn parse_unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}
