//! Infrastructure layer for Switchboard.
//!
//! Contains implementations of the ports defined in `switchboard-core`:
//! SQLite-backed `KvStore`, the WhatsApp Graph API `ProviderClient`, and the
//! `config.toml` / environment loader.

pub mod config;
pub mod provider;
pub mod sqlite;
