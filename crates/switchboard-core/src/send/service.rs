//! Send service: account lookup, destination formatting, the provider call,
//! and recording of accepted outgoing messages.

use std::sync::Arc;

use secrecy::SecretString;

use switchboard_types::account::Account;
use switchboard_types::error::{ProviderError, SendError};
use switchboard_types::message::Direction;
use switchboard_types::provider::{MessageKind, OutboundMessage, SendOutcome};

use crate::event::EventFanout;
use crate::phone;
use crate::registry::AccountRegistry;
use crate::send::provider::ProviderClient;
use crate::storage::KvStore;
use crate::store::{AppendReceipt, MessageStore, NewMessage};

/// A send request as received from the HTTP or CLI surface.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
}

/// Result of [`SendService::send_and_record`].
#[derive(Debug, Clone)]
pub struct SendReport {
    pub account_id: String,
    pub outcome: SendOutcome,
    /// Present when the provider accepted the message.
    pub receipt: Option<AppendReceipt>,
}

pub struct SendService<K: KvStore, P: ProviderClient> {
    registry: Arc<AccountRegistry<K>>,
    store: Arc<MessageStore<K>>,
    fanout: Arc<EventFanout>,
    provider: Arc<P>,
    template_name: String,
}

impl<K: KvStore, P: ProviderClient> SendService<K, P> {
    pub fn new(
        registry: Arc<AccountRegistry<K>>,
        store: Arc<MessageStore<K>>,
        fanout: Arc<EventFanout>,
        provider: Arc<P>,
        template_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            fanout,
            provider,
            template_name: template_name.into(),
        }
    }

    /// Ask the provider for the phone number id of a business account.
    ///
    /// Used when an account is registered without one.
    pub async fn discover_phone_number_id(
        &self,
        business_id: &str,
        token: &SecretString,
    ) -> Result<Option<String>, ProviderError> {
        if business_id.trim().is_empty() {
            return Ok(None);
        }
        let found = self.provider.lookup_phone_number_id(business_id.trim(), token).await?;
        match &found {
            Some(phone_id) => {
                tracing::info!(business_id, phone_number_id = %phone_id, "phone number id discovered");
            }
            None => tracing::warn!(business_id, "business account has no phone numbers"),
        }
        Ok(found)
    }

    /// Pick the sending account.
    ///
    /// Both provider ids given: exact match. Explicit account id: that
    /// account. Nothing: the default account. The result is always active.
    pub async fn resolve_sender(
        &self,
        account_id: Option<&str>,
        business_id: Option<&str>,
        phone_id: Option<&str>,
    ) -> Result<Account, SendError> {
        let id = match (account_id, business_id, phone_id) {
            (_, Some(business_id), Some(phone_id)) => self.registry.resolve_by_ids(business_id, phone_id).await?,
            (Some(id), _, _) => id.to_string(),
            _ => self.registry.default_account_id().to_string(),
        };
        Ok(self.registry.get_active(&id).await?)
    }

    /// Send through the provider without recording anything.
    pub async fn send_message(&self, account: &Account, request: &SendRequest) -> Result<SendOutcome, SendError> {
        if request.to.trim().is_empty() {
            return Err(SendError::InvalidRequest("recipient phone number is required".to_string()));
        }
        if request.kind == MessageKind::Text && request.text.trim().is_empty() {
            return Err(SendError::InvalidRequest("message text is required".to_string()));
        }

        let destination = phone::format_for_provider(&request.to);
        if destination.is_empty() {
            return Err(SendError::InvalidRequest(format!(
                "'{}' is not a phone number",
                request.to
            )));
        }

        let outbound = OutboundMessage {
            to: destination.clone(),
            kind: request.kind,
            text: request.text.clone(),
        };

        tracing::info!(
            account_id = %account.id,
            phone = %destination,
            kind = %request.kind,
            "sending message"
        );

        let outcome = match self.provider.send(account, &outbound).await {
            Ok(ack) => SendOutcome::Accepted {
                external_message_id: ack.external_message_id,
                phone_number: destination,
                account_id: account.id.clone(),
                raw_response: ack.raw,
            },
            Err(e) => {
                tracing::warn!(account_id = %account.id, phone = %destination, error = %e, "provider rejected send");
                let raw_response = match &e {
                    ProviderError::Rejected { raw, .. } => raw.clone(),
                    _ => None,
                };
                SendOutcome::Failed {
                    error_message: e.to_string(),
                    phone_number: destination,
                    raw_response,
                }
            }
        };
        Ok(outcome)
    }

    /// Send, and on acceptance append the outgoing message and publish it.
    pub async fn send_and_record(&self, account: &Account, request: &SendRequest) -> Result<SendReport, SendError> {
        let outcome = self.send_message(account, request).await?;

        let receipt = match &outcome {
            SendOutcome::Accepted {
                external_message_id,
                phone_number,
                ..
            } => {
                let text = match request.kind {
                    MessageKind::Text => request.text.clone(),
                    MessageKind::Template => format!("[template: {}]", self.template_name),
                };
                let new = NewMessage::new(account.id.clone(), phone_number.clone(), text, Direction::Outgoing)
                    .with_external_id(external_message_id.clone());
                Some(self.store.append_and_publish(new, &self.fanout).await?)
            }
            SendOutcome::Failed { .. } => None,
        };

        Ok(SendReport {
            account_id: account.id.clone(),
            outcome,
            receipt,
        })
    }
}
