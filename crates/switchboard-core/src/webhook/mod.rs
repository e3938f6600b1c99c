//! Inbound webhook handling: signature verification and delivery routing.

pub mod router;
pub mod signature;

pub use router::{DeliveryOutcome, DeliveryReport, Verification, WebhookRouter, verify_subscription};
pub use signature::{SignatureCheck, SignatureVerifier};
