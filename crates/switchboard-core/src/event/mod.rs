//! Real-time event distribution.
//!
//! `EventFanout` delivers `RelayEvent` messages to viewers subscribed to a
//! conversation and to a process-wide `tokio::sync::broadcast` channel.

pub mod fanout;

pub use fanout::{EventFanout, FanoutReport, SubscriberId};
