//! Relay logic and port trait definitions for Switchboard.
//!
//! This crate defines the "ports" (`KvStore`, `ProviderClient`) that the
//! infrastructure layer implements, plus the registry, message store,
//! fanout, webhook router and send service built on them. It depends only
//! on `switchboard-types` -- never on `switchboard-infra` or any
//! database/IO crate.

pub mod event;
pub mod phone;
pub mod registry;
pub mod send;
pub mod storage;
pub mod store;
pub mod webhook;
