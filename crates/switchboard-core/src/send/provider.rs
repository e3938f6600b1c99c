//! Outbound provider port.
//!
//! Implementations live in switchboard-infra.

use std::future::Future;

use secrecy::SecretString;

use switchboard_types::account::Account;
use switchboard_types::error::ProviderError;
use switchboard_types::provider::{OutboundMessage, ProviderAck};

/// Capability to hand one message to the messaging provider.
///
/// A returned `Ok` means the provider accepted the message, nothing more.
/// Implementations bound the call with their own timeout and never retry.
pub trait ProviderClient: Send + Sync {
    fn send(
        &self,
        account: &Account,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<ProviderAck, ProviderError>> + Send;

    /// First phone number id registered under a business account, `None`
    /// when the business has no numbers.
    fn lookup_phone_number_id(
        &self,
        business_id: &str,
        token: &SecretString,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send;
}
