//! Messaging provider adapters.

pub mod graph;

pub use graph::GraphApiClient;
