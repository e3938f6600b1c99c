//! Conversation types: messages, contact keys and contact summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::account::AccountId;

/// Default retention bound for one conversation log.
pub const DEFAULT_RETENTION: usize = 100;

/// Whether a message was received from the contact or sent by the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(format!("invalid direction: '{other}'")),
        }
    }
}

/// Addressing unit for one conversation: (account, canonical phone).
///
/// The phone is always normalizer output; constructing a key from raw input
/// goes through `switchboard_core::phone::normalize` first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactKey {
    pub account_id: AccountId,
    pub phone: String,
}

impl ContactKey {
    pub fn new(account_id: impl Into<AccountId>, canonical_phone: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            phone: canonical_phone.into(),
        }
    }

    /// Durable store key for this conversation's log.
    pub fn storage_key(&self) -> String {
        format!("messages:{}:{}", self.account_id, self.phone)
    }
}

impl fmt::Display for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.phone)
    }
}

/// One stored message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub account_id: AccountId,
    /// Canonical phone of the contact (not of the account).
    pub phone_number: String,
    pub text: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,
    /// Per-log sequence number, strictly increasing in append order.
    #[serde(default)]
    pub seq: u64,
}

impl Message {
    pub fn contact_key(&self) -> ContactKey {
        ContactKey::new(self.account_id.clone(), self.phone_number.clone())
    }
}

/// Derived per-contact overview used by contact listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub phone_number: String,
    pub display_name: String,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub message_count: usize,
}
