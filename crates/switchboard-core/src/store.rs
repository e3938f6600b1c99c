//! Bounded per-conversation message logs.
//!
//! The store is a two-level container `account -> phone -> ContactLog`, kept
//! in memory and mirrored to the durable [`KvStore`] under
//! `messages:{account}:{phone}` (newest first, trimmed to the retention
//! bound).
//!
//! Appends are split into [`MessageStore::stage`] and
//! [`StagedAppend::commit`]. Staging takes the conversation's lock, assigns
//! the id and updates the in-memory mirror; commit performs the durable
//! write and releases the lock. Callers publish to viewers in between so
//! durable latency never delays real-time delivery.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use switchboard_types::account::AccountId;
use switchboard_types::error::{RepositoryError, StoreError};
use switchboard_types::message::{ContactKey, ContactSummary, DEFAULT_RETENTION, Direction, Message};

use crate::event::fanout::{EventFanout, FanoutReport};
use crate::phone;
use crate::storage::{DEFAULT_DURABLE_TIMEOUT, Durability, KvStore, bounded};

/// Input for one append. `phone` is raw and is normalized by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub account_id: AccountId,
    pub phone: String,
    pub text: String,
    pub direction: Direction,
    pub external_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn new(
        account_id: impl Into<AccountId>,
        phone: impl Into<String>,
        text: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            phone: phone.into(),
            text: text.into(),
            direction,
            external_id: None,
            timestamp: None,
        }
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Result of a completed append.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    pub message: Message,
    /// The external id was already present; nothing new was stored.
    pub duplicate: bool,
    pub durability: Durability,
    /// Set when the append went through [`MessageStore::append_and_publish`]
    /// and was not a duplicate.
    pub fanout: Option<FanoutReport>,
}

/// Aggregate counts for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub accounts: usize,
    pub contacts: usize,
    pub messages: usize,
    pub durable: bool,
    pub retention: usize,
}

struct ContactLog {
    messages: VecDeque<Message>,
    last_seq: u64,
    hydrated: bool,
}

impl ContactLog {
    fn empty() -> Self {
        Self {
            messages: VecDeque::new(),
            last_seq: 0,
            hydrated: false,
        }
    }
}

type LogHandle = Arc<Mutex<ContactLog>>;

pub struct MessageStore<K: KvStore> {
    logs: DashMap<AccountId, DashMap<String, LogHandle>>,
    durable: Option<Arc<K>>,
    retention: usize,
    durable_timeout: Duration,
}

impl<K: KvStore> MessageStore<K> {
    pub fn new(durable: Option<Arc<K>>) -> Self {
        Self {
            logs: DashMap::new(),
            durable,
            retention: DEFAULT_RETENTION,
            durable_timeout: DEFAULT_DURABLE_TIMEOUT,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn with_durable_timeout(mut self, timeout: Duration) -> Self {
        self.durable_timeout = timeout;
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Start an append: normalize, lock the conversation, assign the id and
    /// update the in-memory mirror.
    ///
    /// The returned [`StagedAppend`] holds the conversation lock until it is
    /// committed or dropped, so appends to one key are strictly ordered.
    pub async fn stage(&self, new: NewMessage) -> Result<StagedAppend<K>, StoreError> {
        let canonical = phone::normalize(&new.phone);
        if canonical.is_empty() {
            return Err(StoreError::InvalidPhone(new.phone));
        }
        let key = ContactKey::new(new.account_id, canonical);

        let handle = self.handle(&key);
        let mut log = handle.lock_owned().await;
        if !log.hydrated {
            self.hydrate(&key, &mut log).await;
        }

        if let Some(external_id) = new.external_id.as_deref()
            && let Some(existing) = log
                .messages
                .iter()
                .find(|m| m.external_message_id.as_deref() == Some(external_id))
        {
            tracing::debug!(key = %key, message_id = %existing.id, "duplicate external id, not appended");
            let message = existing.clone();
            return Ok(StagedAppend {
                log,
                key,
                message,
                duplicate: true,
                durable: None,
                retention: self.retention,
                durable_timeout: self.durable_timeout,
            });
        }

        let timestamp = new.timestamp.unwrap_or_else(Utc::now);
        let seq = log.last_seq + 1;
        let id = new
            .external_id
            .clone()
            .unwrap_or_else(|| format!("{}_{}_{}", new.direction, seq, timestamp.timestamp_millis()));

        let message = Message {
            id,
            account_id: key.account_id.clone(),
            phone_number: key.phone.clone(),
            text: new.text,
            direction: new.direction,
            timestamp,
            external_message_id: new.external_id,
            seq,
        };

        log.last_seq = seq;
        log.messages.push_back(message.clone());
        while log.messages.len() > self.retention {
            log.messages.pop_front();
        }

        Ok(StagedAppend {
            log,
            key,
            message,
            duplicate: false,
            durable: self.durable.clone(),
            retention: self.retention,
            durable_timeout: self.durable_timeout,
        })
    }

    /// Stage and commit in one step. Always succeeds in memory for a valid phone.
    pub async fn append(&self, new: NewMessage) -> Result<AppendReceipt, StoreError> {
        Ok(self.stage(new).await?.commit().await)
    }

    /// Stage, publish to live viewers, then commit.
    pub async fn append_and_publish(
        &self,
        new: NewMessage,
        fanout: &EventFanout,
    ) -> Result<AppendReceipt, StoreError> {
        let staged = self.stage(new).await?;
        let report = (!staged.is_duplicate()).then(|| {
            let key = staged.key();
            fanout.publish(&key.account_id, &key.phone, staged.message().clone())
        });
        let mut receipt = staged.commit().await;
        receipt.fanout = report;
        Ok(receipt)
    }

    /// Messages of one conversation, oldest first.
    ///
    /// The durable log wins when present and non-empty; otherwise (or on a
    /// durable read error) the in-memory mirror is returned.
    pub async fn get(&self, account_id: &str, raw_phone: &str) -> Vec<Message> {
        let key = ContactKey::new(account_id, phone::normalize(raw_phone));

        if let Some(kv) = &self.durable {
            match bounded(self.durable_timeout, kv.list(&key.storage_key(), self.retention)).await {
                Ok(items) if !items.is_empty() => {
                    let mut messages = decode_messages(&key, items);
                    messages.reverse();
                    return messages;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "durable read failed, serving in-memory log");
                }
            }
        }

        let Some(handle) = self.existing_handle(&key) else {
            return Vec::new();
        };
        let log = handle.lock().await;
        log.messages.iter().cloned().collect()
    }

    /// Contacts of one account from the in-memory mirror, most recent first.
    pub async fn list_contacts(&self, account_id: &str) -> Vec<ContactSummary> {
        let handles: Vec<(String, LogHandle)> = match self.logs.get(account_id) {
            Some(phones) => phones
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            None => return Vec::new(),
        };

        let mut contacts = Vec::with_capacity(handles.len());
        for (phone_number, handle) in handles {
            let log = handle.lock().await;
            let Some(last) = log.messages.back() else {
                continue;
            };
            contacts.push(ContactSummary {
                display_name: phone::contact_name(&phone_number),
                last_message: last.text.clone(),
                last_message_time: last.timestamp,
                message_count: log.messages.len(),
                phone_number,
            });
        }

        contacts.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        contacts
    }

    pub fn contact_count(&self, account_id: &str) -> usize {
        self.logs.get(account_id).map_or(0, |phones| phones.len())
    }

    pub async fn stats(&self) -> StoreStats {
        let handles: Vec<LogHandle> = self
            .logs
            .iter()
            .flat_map(|phones| phones.iter().map(|e| e.value().clone()).collect::<Vec<_>>())
            .collect();

        let mut messages = 0;
        for handle in &handles {
            messages += handle.lock().await.messages.len();
        }

        StoreStats {
            accounts: self.logs.len(),
            contacts: handles.len(),
            messages,
            durable: self.durable.is_some(),
            retention: self.retention,
        }
    }

    fn handle(&self, key: &ContactKey) -> LogHandle {
        self.logs
            .entry(key.account_id.clone())
            .or_default()
            .entry(key.phone.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ContactLog::empty())))
            .clone()
    }

    fn existing_handle(&self, key: &ContactKey) -> Option<LogHandle> {
        self.logs
            .get(&key.account_id)?
            .get(&key.phone)
            .map(|h| h.value().clone())
    }

    /// Seed the mirror and sequence counter from the durable log on first touch.
    async fn hydrate(&self, key: &ContactKey, log: &mut ContactLog) {
        log.hydrated = true;
        let Some(kv) = &self.durable else {
            return;
        };

        match bounded(self.durable_timeout, kv.list(&key.storage_key(), self.retention)).await {
            Ok(items) => {
                let mut messages = decode_messages(key, items);
                messages.reverse();
                log.last_seq = messages.iter().map(|m| m.seq).max().unwrap_or(0);
                if log.messages.is_empty() {
                    log.messages = messages.into();
                }
                tracing::debug!(key = %key, last_seq = log.last_seq, "hydrated conversation from durable store");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to hydrate conversation, starting empty");
            }
        }
    }
}

fn decode_messages(key: &ContactKey, items: Vec<serde_json::Value>) -> Vec<Message> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Message>(item) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping undecodable stored message");
                None
            }
        })
        .collect()
}

impl<K: KvStore> std::fmt::Debug for MessageStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("accounts", &self.logs.len())
            .field("durable", &self.durable.is_some())
            .field("retention", &self.retention)
            .finish()
    }
}

/// An append applied in memory whose durable write is still pending.
///
/// Holds the conversation lock. Dropping it without committing keeps the
/// in-memory append and skips the durable write.
pub struct StagedAppend<K: KvStore> {
    log: OwnedMutexGuard<ContactLog>,
    key: ContactKey,
    message: Message,
    duplicate: bool,
    durable: Option<Arc<K>>,
    retention: usize,
    durable_timeout: Duration,
}

impl<K: KvStore> StagedAppend<K> {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn key(&self) -> &ContactKey {
        &self.key
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    /// Write the message to the durable log and release the conversation lock.
    ///
    /// Durable failures are logged and reported, never raised.
    pub async fn commit(self) -> AppendReceipt {
        let durability = if self.duplicate {
            Durability::Skipped
        } else {
            match &self.durable {
                None => Durability::Unavailable,
                Some(kv) => match self.write(kv.as_ref()).await {
                    Ok(()) => Durability::Durable,
                    Err(e) => {
                        tracing::warn!(
                            key = %self.key,
                            message_id = %self.message.id,
                            error = %e,
                            "durable append failed, message kept in memory"
                        );
                        Durability::MemoryOnly(e.to_string())
                    }
                },
            }
        };
        drop(self.log);

        AppendReceipt {
            message: self.message,
            duplicate: self.duplicate,
            durability,
            fanout: None,
        }
    }

    async fn write(&self, kv: &K) -> Result<(), RepositoryError> {
        let value =
            serde_json::to_value(&self.message).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        bounded(
            self.durable_timeout,
            kv.push_front(&self.key.storage_key(), &value, self.retention),
        )
        .await
    }
}
