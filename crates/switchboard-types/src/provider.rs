//! Outbound send types shared by the send service and provider adapters.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Kind of outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    /// Pre-approved template, required to open a conversation.
    Template,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Template => write!(f, "template"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "template" => Ok(MessageKind::Template),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// Request handed to a provider client. `to` is already provider-formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub kind: MessageKind,
    /// Body for text sends; ignored for templates.
    pub text: String,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAck {
    pub external_message_id: Option<String>,
    pub raw: serde_json::Value,
}

/// Result of a send attempt. Provider failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Accepted {
        external_message_id: Option<String>,
        phone_number: String,
        account_id: String,
        raw_response: serde_json::Value,
    },
    Failed {
        error_message: String,
        phone_number: String,
        raw_response: Option<serde_json::Value>,
    },
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_default_and_parse() {
        assert_eq!(MessageKind::default(), MessageKind::Text);
        assert_eq!("Template".parse::<MessageKind>().unwrap(), MessageKind::Template);
        assert!("audio".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_send_outcome_is_tagged_by_status() {
        let outcome = SendOutcome::Failed {
            error_message: "rejected".to_string(),
            phone_number: "2349025794407".to_string(),
            raw_response: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_message"], "rejected");
        assert!(!outcome.is_accepted());
    }

    #[test]
    fn test_message_kind_serde() {
        let kind: MessageKind = serde_json::from_str(r#""template""#).unwrap();
        assert_eq!(kind, MessageKind::Template);
        assert_eq!(serde_json::to_string(&MessageKind::Text).unwrap(), r#""text""#);
    }

    #[test]
    fn test_outcome_is_accepted() {
        let failed = SendOutcome::Failed {
            error_message: "nope".to_string(),
            phone_number: "234".to_string(),
            raw_response: None,
        };
        assert!(!failed.is_accepted());
    }
}
