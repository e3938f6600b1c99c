//! HTTP/WebSocket surface of the relay.
//!
//! Axum router with the webhook endpoint, send endpoints, account
//! management, conversation queries and the `/ws` real-time channel.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
