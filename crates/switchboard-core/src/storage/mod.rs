//! Storage abstractions for Switchboard.
//!
//! Defines the durable key-value port. Implementations live in
//! switchboard-infra; test doubles live in [`testing`].

pub mod kv_store;

#[cfg(test)]
pub(crate) mod testing;

pub use kv_store::{DEFAULT_DURABLE_TIMEOUT, Durability, KvStore, bounded};
