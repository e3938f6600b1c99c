//! GraphApiClient -- concrete [`ProviderClient`] for the WhatsApp Cloud API.
//!
//! Posts to `{base_url}/{api_version}/{phone_number_id}/messages` with the
//! account's bearer token, and reads `{business_id}/phone_numbers` to
//! discover a phone number id. The token is only exposed when building the
//! `Authorization` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use switchboard_core::send::ProviderClient;
use switchboard_types::account::Account;
use switchboard_types::config::ProviderConfig;
use switchboard_types::error::ProviderError;
use switchboard_types::provider::{MessageKind, OutboundMessage, ProviderAck};

pub struct GraphApiClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    template_name: String,
    template_language: String,
}

impl GraphApiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            template_name: config.template_name.clone(),
            template_language: config.template_language.clone(),
        })
    }

    fn url(&self, phone_number_id: &str) -> String {
        format!("{}/{}/{}/messages", self.base_url, self.api_version, phone_number_id)
    }

    fn phone_numbers_url(&self, business_id: &str) -> String {
        format!("{}/{}/{}/phone_numbers", self.base_url, self.api_version, business_id)
    }

    fn request_body<'a>(&'a self, message: &'a OutboundMessage) -> GraphMessage<'a> {
        let (text, template) = match message.kind {
            MessageKind::Text => (Some(GraphText { body: &message.text }), None),
            MessageKind::Template => (
                None,
                Some(GraphTemplate {
                    name: &self.template_name,
                    language: GraphLanguage {
                        code: &self.template_language,
                    },
                }),
            ),
        };

        GraphMessage {
            messaging_product: "whatsapp",
            to: &message.to,
            kind: message.kind,
            text,
            template,
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<GraphText<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<GraphTemplate<'a>>,
}

#[derive(Debug, Serialize)]
struct GraphText<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct GraphTemplate<'a> {
    name: &'a str,
    language: GraphLanguage<'a>,
}

#[derive(Debug, Serialize)]
struct GraphLanguage<'a> {
    code: &'a str,
}

/// `messages[0].id` of a success response.
fn accepted_id(body: &serde_json::Value) -> Option<String> {
    body.pointer("/messages/0/id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

/// `error.message` of a failure response.
fn error_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// `data[0].id` of a phone number listing.
fn first_phone_number_id(body: &serde_json::Value) -> Option<String> {
    body.pointer("/data/0/id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Read the body as JSON (or a raw string) and turn non-2xx into `Rejected`.
async fn read_response(response: reqwest::Response) -> Result<serde_json::Value, ProviderError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

    if !status.is_success() {
        let message = error_message(&raw).unwrap_or_else(|| format!("HTTP {status}"));
        tracing::debug!(status = %status, "provider returned an error");
        return Err(ProviderError::Rejected { message, raw: Some(raw) });
    }
    Ok(raw)
}

impl ProviderClient for GraphApiClient {
    async fn send(&self, account: &Account, message: &OutboundMessage) -> Result<ProviderAck, ProviderError> {
        let url = self.url(&account.external_phone_id);
        let body = self.request_body(message);

        let response = self
            .client
            .post(&url)
            .bearer_auth(account.secret_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let raw = read_response(response).await?;
        Ok(ProviderAck {
            external_message_id: accepted_id(&raw),
            raw,
        })
    }

    async fn lookup_phone_number_id(
        &self,
        business_id: &str,
        token: &SecretString,
    ) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(self.phone_numbers_url(business_id))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        let raw = read_response(response).await?;
        Ok(first_phone_number_id(&raw))
    }
}
