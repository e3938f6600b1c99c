//! Outbound send path.

pub mod provider;
pub mod service;

pub use provider::ProviderClient;
pub use service::{SendReport, SendRequest, SendService};
