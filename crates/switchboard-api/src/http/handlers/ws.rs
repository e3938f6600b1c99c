//! WebSocket handler for live conversation updates.
//!
//! The `/ws` endpoint upgrades an HTTP connection to a WebSocket. Each
//! connection owns one bounded mailbox. Clients:
//!
//! - **join / leave** a conversation room (`{phone_number, account_id?}`,
//!   account defaults to the default account) and receive `new_message`
//!   events for it through the mailbox;
//! - **subscribe_updates** to receive every `new_message` on the
//!   process-wide channel;
//! - **ping** and get `{"type":"pong"}`.
//!
//! A client that both joined rooms and subscribed to updates gets each event
//! once, from the update channel. A full mailbox drops events for this client
//! only. Disconnecting removes every subscription of the connection.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use switchboard_core::event::SubscriberId;
use switchboard_core::phone;
use switchboard_types::event::RelayEvent;
use switchboard_types::message::ContactKey;

use crate::state::AppState;

/// Per-connection mailbox capacity.
pub const MAILBOX_CAPACITY: usize = 64;

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed frames are logged and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Join {
        phone_number: String,
        account_id: Option<String>,
    },
    Leave {
        phone_number: String,
        account_id: Option<String>,
    },
    SubscribeUpdates,
    Ping,
}

/// GET /ws - Upgrade to a WebSocket connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Per-connection state shared by the command handlers.
struct Connection {
    id: SubscriberId,
    mailbox: mpsc::Sender<RelayEvent>,
    updates: Option<broadcast::Receiver<RelayEvent>>,
}

/// Where an event reached the connection from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventSource {
    Room,
    Updates,
}

impl Connection {
    /// The update channel carries every room, so room events are redundant
    /// once the connection subscribes to it.
    fn wants(&self, source: EventSource) -> bool {
        match source {
            EventSource::Room => self.updates.is_none(),
            EventSource::Updates => true,
        }
    }
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (mailbox, mut inbox) = mpsc::channel(MAILBOX_CAPACITY);
    let mut conn = Connection {
        id: Uuid::now_v7(),
        mailbox,
        updates: None,
    };
    tracing::debug!(subscriber = %conn.id, "WebSocket connected");

    loop {
        tokio::select! {
            Some(event) = inbox.recv() => {
                if conn.wants(EventSource::Room) && !forward(&mut ws_sender, &event).await {
                    break;
                }
            }

            update = next_update(&mut conn.updates) => {
                match update {
                    Ok(event) => {
                        if !forward(&mut ws_sender, &event).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(subscriber = %conn.id, skipped = n, "update subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        conn.updates = None;
                    }
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = process_command(&text, &state, &mut conn)
                            && ws_sender.send(Message::Text(reply.to_string().into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(subscriber = %conn.id, "WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.fanout.leave_all(conn.id);
    tracing::debug!(subscriber = %conn.id, "WebSocket connection closed");
}

/// Receive from the update channel, or never resolve when not subscribed.
async fn next_update(
    updates: &mut Option<broadcast::Receiver<RelayEvent>>,
) -> Result<RelayEvent, broadcast::error::RecvError> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send one event as a JSON text frame. Returns `false` once the client is gone.
async fn forward(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &RelayEvent,
) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(err) => {
            tracing::warn!("Failed to serialize RelayEvent: {err}");
            true
        }
    }
}

fn room_key(state: &AppState, account_id: Option<String>, raw_phone: &str) -> Option<ContactKey> {
    let phone = phone::normalize(raw_phone);
    if phone.is_empty() {
        return None;
    }
    let account_id = account_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| state.registry.default_account_id().to_string());
    Some(ContactKey::new(account_id, phone))
}

/// Apply one client command and return the reply frame, if any.
fn process_command(text: &str, state: &AppState, conn: &mut Connection) -> Option<serde_json::Value> {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket command");
            return None;
        }
    };

    match cmd {
        WsCommand::Join {
            phone_number,
            account_id,
        } => {
            let Some(key) = room_key(state, account_id, &phone_number) else {
                return Some(json!({"type": "error", "message": format!("'{phone_number}' is not a phone number")}));
            };
            let reply = json!({"type": "joined", "account_id": key.account_id, "phone_number": key.phone});
            state.fanout.join(key, conn.id, conn.mailbox.clone());
            Some(reply)
        }
        WsCommand::Leave {
            phone_number,
            account_id,
        } => {
            let key = room_key(state, account_id, &phone_number)?;
            state.fanout.leave(&key, conn.id);
            Some(json!({"type": "left", "account_id": key.account_id, "phone_number": key.phone}))
        }
        WsCommand::SubscribeUpdates => {
            if conn.updates.is_none() {
                conn.updates = Some(state.fanout.subscribe_updates());
            }
            Some(json!({"type": "subscribed"}))
        }
        WsCommand::Ping => Some(json!({"type": "pong"})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{seeded_config, test_state};
    use switchboard_core::store::NewMessage;
    use switchboard_types::message::Direction;

    fn connection() -> (Connection, mpsc::Receiver<RelayEvent>) {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let conn = Connection {
            id: Uuid::now_v7(),
            mailbox,
            updates: None,
        };
        (conn, inbox)
    }

    #[tokio::test]
    async fn join_defaults_to_default_account_and_receives_events() {
        let state = test_state(seeded_config()).await;
        let (mut conn, mut inbox) = connection();

        let reply = process_command(r#"{"type":"join","phone_number":"09025794407"}"#, &state, &mut conn).unwrap();
        assert_eq!(reply["type"], "joined");
        assert_eq!(reply["account_id"], "main");
        assert_eq!(reply["phone_number"], "2349025794407");
        assert_eq!(state.fanout.subscription_count(), 1);

        let new = NewMessage::new("main", "2349025794407", "hello", Direction::Incoming);
        state.store.append_and_publish(new, &state.fanout).await.unwrap();

        let event = inbox.try_recv().unwrap();
        assert_eq!(event.phone_number(), "2349025794407");
    }

    #[tokio::test]
    async fn rooms_are_scoped_by_account() {
        let state = test_state(seeded_config()).await;
        let (mut conn, mut inbox) = connection();
        process_command(
            r#"{"type":"join","phone_number":"2349025794407","account_id":"secondary"}"#,
            &state,
            &mut conn,
        );

        let new = NewMessage::new("main", "2349025794407", "for main", Direction::Incoming);
        state.store.append_and_publish(new, &state.fanout).await.unwrap();
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_and_leave_all_remove_subscriptions() {
        let state = test_state(seeded_config()).await;
        let (mut conn, _inbox) = connection();
        process_command(r#"{"type":"join","phone_number":"2349025794407"}"#, &state, &mut conn);
        process_command(r#"{"type":"join","phone_number":"2348011112222"}"#, &state, &mut conn);
        assert_eq!(state.fanout.subscription_count(), 2);

        let reply = process_command(r#"{"type":"leave","phone_number":"2349025794407"}"#, &state, &mut conn).unwrap();
        assert_eq!(reply["type"], "left");
        assert_eq!(state.fanout.subscription_count(), 1);

        state.fanout.leave_all(conn.id);
        assert_eq!(state.fanout.subscription_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_updates_sees_every_account() {
        let state = test_state(seeded_config()).await;
        let (mut conn, _inbox) = connection();
        process_command(r#"{"type":"subscribe_updates"}"#, &state, &mut conn);
        assert_eq!(state.fanout.update_subscriber_count(), 1);

        let new = NewMessage::new("secondary", "2349025794407", "hi", Direction::Incoming);
        state.store.append_and_publish(new, &state.fanout).await.unwrap();

        let event = next_update(&mut conn.updates).await.unwrap();
        assert_eq!(event.account_id(), "secondary");
    }

    #[tokio::test]
    async fn joined_and_subscribed_connection_gets_one_frame_per_event() {
        let state = test_state(seeded_config()).await;
        let (mut conn, mut inbox) = connection();
        process_command(r#"{"type":"join","phone_number":"2349025794407"}"#, &state, &mut conn);
        assert!(conn.wants(EventSource::Room));
        process_command(r#"{"type":"subscribe_updates"}"#, &state, &mut conn);

        let new = NewMessage::new("main", "2349025794407", "once", Direction::Incoming);
        state.store.append_and_publish(new, &state.fanout).await.unwrap();

        let mut forwarded = 0;
        while inbox.try_recv().is_ok() {
            if conn.wants(EventSource::Room) {
                forwarded += 1;
            }
        }
        let wants_updates = conn.wants(EventSource::Updates);
        if let Some(rx) = conn.updates.as_mut() {
            while rx.try_recv().is_ok() {
                if wants_updates {
                    forwarded += 1;
                }
            }
        }
        assert_eq!(forwarded, 1);
    }

    #[tokio::test]
    async fn ping_and_garbage() {
        let state = test_state(seeded_config()).await;
        let (mut conn, _inbox) = connection();
        assert_eq!(process_command(r#"{"type":"ping"}"#, &state, &mut conn).unwrap()["type"], "pong");
        assert!(process_command("not json", &state, &mut conn).is_none());
        assert!(process_command(r#"{"type":"dance"}"#, &state, &mut conn).is_none());

        let reply = process_command(r#"{"type":"join","phone_number":"abc"}"#, &state, &mut conn).unwrap();
        assert_eq!(reply["type"], "error");
        assert_eq!(state.fanout.subscription_count(), 0);
    }
}
