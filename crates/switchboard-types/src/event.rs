//! Real-time events pushed to connected viewers.

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::message::Message;

/// Event emitted by the fanout whenever a conversation log gains a message.
///
/// Serialized with a `type` tag so WebSocket clients can dispatch on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    NewMessage {
        account_id: AccountId,
        phone_number: String,
        message: Message,
    },
}

impl RelayEvent {
    pub fn account_id(&self) -> &str {
        match self {
            RelayEvent::NewMessage { account_id, .. } => account_id,
        }
    }

    pub fn phone_number(&self) -> &str {
        match self {
            RelayEvent::NewMessage { phone_number, .. } => phone_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Direction;

    #[test]
    fn test_new_message_wire_format() {
        let event = RelayEvent::NewMessage {
            account_id: "main".to_string(),
            phone_number: "2349025794407".to_string(),
            message: Message {
                id: "incoming_1_1700000000000".to_string(),
                account_id: "main".to_string(),
                phone_number: "2349025794407".to_string(),
                text: "hi".to_string(),
                direction: Direction::Incoming,
                timestamp: chrono::Utc::now(),
                external_message_id: None,
                seq: 1,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["account_id"], "main");
        assert_eq!(json["message"]["text"], "hi");
        assert_eq!(event.phone_number(), "2349025794407");
    }
}
