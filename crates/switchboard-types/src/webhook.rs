//! Typed shape of a provider delivery notification.
//!
//! Only the parts the relay reads are modelled. Unknown fields are ignored
//! and collections default to empty so partial payloads (status callbacks,
//! test pings) parse cleanly.

use serde::Deserialize;

/// Top-level delivery body: `{"object": ..., "entry": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    /// Business account id of the entry.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// One change. `value` is kept raw and only decoded when `field` is
/// `"messages"`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Decoded `value` of a `messages` change.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesValue {
    pub metadata: ChangeMetadata,
    #[serde(default)]
    pub contacts: Vec<InboundContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMetadata {
    pub phone_number_id: String,
    #[serde(default)]
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: String,
}

/// One inbound message. Only `type == "text"` carries a `text` body the
/// relay stores.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Sender phone. Empty when the provider omits it; such a message is
    /// skipped rather than failing the whole delivery.
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Unix seconds, as a string.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
}

impl InboundMessage {
    /// Body of a text message, `None` for any other kind.
    pub fn text_body(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.text.as_ref().map(|t| t.body.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELIVERY: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "2139592896448288",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550000000", "phone_number_id": "837445062775054"},
                    "contacts": [{"profile": {"name": "Ada"}, "wa_id": "2349025794407"}],
                    "messages": [{
                        "from": "2349025794407",
                        "id": "wamid.HBgN",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": "hello"}
                    }]
                }
            }]
        }]
    }"#;

    #[test]
    fn test_parse_text_delivery() {
        let payload: WebhookPayload = serde_json::from_str(DELIVERY).unwrap();
        assert_eq!(payload.object, "whatsapp_business_account");
        let change = &payload.entry[0].changes[0];
        assert_eq!(change.field, "messages");

        let value: MessagesValue = serde_json::from_value(change.value.clone()).unwrap();
        assert_eq!(value.metadata.phone_number_id, "837445062775054");
        assert_eq!(value.contacts[0].profile.as_ref().unwrap().name, "Ada");
        assert_eq!(value.messages[0].text_body(), Some("hello"));
        assert_eq!(value.messages[0].id.as_deref(), Some("wamid.HBgN"));
    }

    #[test]
    fn test_non_text_message_has_no_body() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"from":"234","type":"image","image":{"id":"x"}}"#).unwrap();
        assert!(msg.text_body().is_none());
    }

    #[test]
    fn test_missing_sender_parses_as_empty() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"id":"wamid.x","type":"text","text":{"body":"hi"}}"#).unwrap();
        assert!(msg.from.is_empty());
        assert_eq!(msg.text_body(), Some("hi"));
    }

    #[test]
    fn test_missing_entry_defaults_empty() {
        let payload: WebhookPayload = serde_json::from_str(r#"{"object":"page"}"#).unwrap();
        assert!(payload.entry.is_empty());
    }

    #[test]
    fn test_messages_value_requires_metadata() {
        let result: Result<MessagesValue, _> = serde_json::from_str(r#"{"messages":[]}"#);
        assert!(result.is_err());
    }
}
