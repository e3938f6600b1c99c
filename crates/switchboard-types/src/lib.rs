//! Shared domain types for Switchboard.
//!
//! Accounts, messages, relay events, webhook payloads, outbound send types,
//! configuration and the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod account;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod secret;
pub mod webhook;
