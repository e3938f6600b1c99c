//! Real-time fanout of stored messages to live viewers.
//!
//! Viewers join rooms keyed by [`ContactKey`] with a bounded mpsc mailbox.
//! Publishing never blocks: a full mailbox drops the event for that viewer
//! and a closed one is pruned. Every event is also sent on a process-wide
//! `tokio::sync::broadcast` channel for viewers that follow all traffic.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use switchboard_types::event::RelayEvent;
use switchboard_types::message::{ContactKey, Message};

/// Identifier of one connected viewer.
pub type SubscriberId = Uuid;

/// Per-publish delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    /// Mailbox was full.
    pub dropped: usize,
    /// Mailbox was closed and the subscription removed.
    pub pruned: usize,
    /// Receivers on the process-wide channel at publish time.
    pub broadcast: usize,
}

pub struct EventFanout {
    rooms: DashMap<ContactKey, HashMap<SubscriberId, mpsc::Sender<RelayEvent>>>,
    updates: broadcast::Sender<RelayEvent>,
}

impl EventFanout {
    /// Create a fanout whose process-wide channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            rooms: DashMap::new(),
            updates,
        }
    }

    /// Register `subscriber` in the room for `key`. Re-joining replaces the sender.
    pub fn join(&self, key: ContactKey, subscriber: SubscriberId, sender: mpsc::Sender<RelayEvent>) {
        tracing::debug!(key = %key, %subscriber, "viewer joined");
        self.rooms.entry(key).or_default().insert(subscriber, sender);
    }

    pub fn leave(&self, key: &ContactKey, subscriber: SubscriberId) {
        let now_empty = match self.rooms.get_mut(key) {
            Some(mut room) => {
                room.remove(&subscriber);
                room.is_empty()
            }
            None => return,
        };
        if now_empty {
            self.rooms.remove_if(key, |_, room| room.is_empty());
        }
        tracing::debug!(key = %key, %subscriber, "viewer left");
    }

    /// Drop every subscription held by `subscriber` (connection closed).
    pub fn leave_all(&self, subscriber: SubscriberId) {
        self.rooms.retain(|_, room| {
            room.remove(&subscriber);
            !room.is_empty()
        });
    }

    /// Deliver a `new_message` event to the room of `(account_id, phone)`
    /// and to the process-wide channel.
    pub fn publish(&self, account_id: &str, phone: &str, message: Message) -> FanoutReport {
        let event = RelayEvent::NewMessage {
            account_id: account_id.to_string(),
            phone_number: phone.to_string(),
            message,
        };
        let key = ContactKey::new(account_id, phone);

        let mut report = FanoutReport::default();
        if let Some(mut room) = self.rooms.get_mut(&key) {
            room.retain(|subscriber, sender| match sender.try_send(event.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(key = %key, %subscriber, "viewer mailbox full, event dropped");
                    report.dropped += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.pruned += 1;
                    false
                }
            });
        }
        if report.pruned > 0 {
            self.rooms.remove_if(&key, |_, room| room.is_empty());
        }

        report.broadcast = self.updates.send(event).unwrap_or(0);
        report
    }

    /// Receiver for every event published from now on.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RelayEvent> {
        self.updates.subscribe()
    }

    /// Number of (room, viewer) subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.rooms.iter().map(|room| room.len()).sum()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn update_subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }
}

impl std::fmt::Debug for EventFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFanout")
            .field("rooms", &self.rooms.len())
            .field("receiver_count", &self.updates.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchboard_types::message::Direction;

    fn message(text: &str) -> Message {
        Message {
            id: format!("incoming_1_{text}"),
            account_id: "main".to_string(),
            phone_number: "2349025794407".to_string(),
            text: text.to_string(),
            direction: Direction::Incoming,
            timestamp: Utc::now(),
            external_message_id: None,
            seq: 1,
        }
    }

    fn key() -> ContactKey {
        ContactKey::new("main", "2349025794407")
    }

    #[tokio::test]
    async fn joined_viewer_receives_event_once() {
        let fanout = EventFanout::new(16);
        let (tx, mut rx) = mpsc::channel(8);
        fanout.join(key(), Uuid::now_v7(), tx);

        let report = fanout.publish("main", "2349025794407", message("hi"));
        assert_eq!(report.delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.account_id(), "main");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn other_rooms_and_accounts_are_not_notified() {
        let fanout = EventFanout::new(16);
        let (tx, mut rx) = mpsc::channel(8);
        fanout.join(ContactKey::new("secondary", "2349025794407"), Uuid::now_v7(), tx);

        let report = fanout.publish("main", "2349025794407", message("hi"));
        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_mailbox_drops_without_blocking() {
        let fanout = EventFanout::new(16);
        let (tx, _rx) = mpsc::channel(1);
        fanout.join(key(), Uuid::now_v7(), tx);

        assert_eq!(fanout.publish("main", "2349025794407", message("a")).delivered, 1);
        let report = fanout.publish("main", "2349025794407", message("b"));
        assert_eq!(report.dropped, 1);
        assert_eq!(fanout.subscription_count(), 1);
    }

    #[tokio::test]
    async fn closed_mailbox_is_pruned() {
        let fanout = EventFanout::new(16);
        let (tx, rx) = mpsc::channel(4);
        fanout.join(key(), Uuid::now_v7(), tx);
        drop(rx);

        let report = fanout.publish("main", "2349025794407", message("a"));
        assert_eq!(report.pruned, 1);
        assert_eq!(fanout.room_count(), 0);
    }

    #[tokio::test]
    async fn leave_and_leave_all_remove_subscriptions() {
        let fanout = EventFanout::new(16);
        let viewer = Uuid::now_v7();
        let (tx, _rx) = mpsc::channel(4);
        fanout.join(key(), viewer, tx.clone());
        fanout.join(ContactKey::new("main", "2348011112222"), viewer, tx);
        assert_eq!(fanout.subscription_count(), 2);

        fanout.leave(&key(), viewer);
        assert_eq!(fanout.subscription_count(), 1);

        fanout.leave_all(viewer);
        assert_eq!(fanout.subscription_count(), 0);
        assert_eq!(fanout.room_count(), 0);
    }

    #[tokio::test]
    async fn updates_channel_sees_every_event() {
        let fanout = EventFanout::new(16);
        let mut updates = fanout.subscribe_updates();

        let report = fanout.publish("main", "2349025794407", message("hi"));
        assert_eq!(report.broadcast, 1);

        let RelayEvent::NewMessage { phone_number, message, .. } = updates.recv().await.unwrap();
        assert_eq!(phone_number, "2349025794407");
        assert_eq!(message.text, "hi");
    }

    #[test]
    fn publish_with_no_viewers_is_a_no_op() {
        let fanout = EventFanout::new(4);
        let report = fanout.publish("main", "2349025794407", message("hi"));
        assert_eq!(report, FanoutReport::default());
    }
}
