//! `X-Hub-Signature-256` verification for inbound deliveries.
//!
//! The header carries `sha256=<hex>` where `<hex>` is the HMAC-SHA256 of the
//! raw request body keyed with the app secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Result of checking one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No app secret configured; the request is accepted unchecked.
    Bypassed,
}

impl SignatureCheck {
    /// Whether the delivery may be processed.
    pub fn is_accepted(self) -> bool {
        !matches!(self, SignatureCheck::Invalid)
    }
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<SecretString>,
}

impl SignatureVerifier {
    /// Create a verifier. `None` (or an empty secret) disables enforcement.
    pub fn new(secret: Option<SecretString>) -> Self {
        let secret = secret.filter(|s| !s.expose_secret().is_empty());
        if secret.is_none() {
            tracing::warn!("no app secret configured, webhook signatures will not be verified");
        }
        Self { secret }
    }

    pub fn is_enforcing(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `signature_header` against the HMAC of `body`.
    ///
    /// A missing header, missing prefix or non-hex digest is `Invalid`.
    /// Comparison is constant-time.
    pub fn verify(&self, body: &[u8], signature_header: Option<&str>) -> SignatureCheck {
        let Some(secret) = &self.secret else {
            tracing::debug!("signature check bypassed");
            return SignatureCheck::Bypassed;
        };

        let Some(digest) = signature_header.and_then(|h| h.trim().strip_prefix(PREFIX)) else {
            tracing::warn!("missing or malformed signature header");
            return SignatureCheck::Invalid;
        };
        let Ok(expected) = hex::decode(digest) else {
            tracing::warn!("signature header is not valid hex");
            return SignatureCheck::Invalid;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
            return SignatureCheck::Invalid;
        };
        mac.update(body);

        match mac.verify_slice(&expected) {
            Ok(()) => SignatureCheck::Valid,
            Err(_) => SignatureCheck::Invalid,
        }
    }

    /// `sha256=<hex>` header value for `body`, or `None` without a secret.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        Some(sign_with(secret.expose_secret(), body))
    }
}

/// Compute the `sha256=<hex>` header value for `body` under `secret`.
pub fn sign_with(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enforcing", &self.is_enforcing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"object":"whatsapp_business_account","entry":[]}"#;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(Some(SecretString::from("app-secret")))
    }

    #[test]
    fn correct_signature_passes() {
        let v = verifier();
        let header = v.sign(BODY).unwrap();
        assert!(header.starts_with("sha256="));
        assert_eq!(v.verify(BODY, Some(&header)), SignatureCheck::Valid);
    }

    #[test]
    fn known_digest() {
        // echo -n 'hello' | openssl dgst -sha256 -hmac 'key'
        assert_eq!(
            sign_with("key", b"hello"),
            "sha256=9307b3b915efb5171ff14d8cb55fbcc798c6c0ef1456d66ded1a6aa723a58b7b"
        );
    }

    #[test]
    fn corrupted_body_byte_fails() {
        let v = verifier();
        let header = v.sign(BODY).unwrap();
        let mut tampered = BODY.to_vec();
        tampered[3] ^= 0x01;
        assert_eq!(v.verify(&tampered, Some(&header)), SignatureCheck::Invalid);
    }

    #[test]
    fn wrong_secret_fails() {
        let header = sign_with("other-secret", BODY);
        assert_eq!(verifier().verify(BODY, Some(&header)), SignatureCheck::Invalid);
    }

    #[test]
    fn missing_or_malformed_header_fails() {
        let v = verifier();
        let digest = v.sign(BODY).unwrap().trim_start_matches("sha256=").to_string();
        assert_eq!(v.verify(BODY, None), SignatureCheck::Invalid);
        assert_eq!(v.verify(BODY, Some(&digest)), SignatureCheck::Invalid);
        assert_eq!(v.verify(BODY, Some("sha256=not-hex")), SignatureCheck::Invalid);
        assert_eq!(v.verify(BODY, Some("sha256=")), SignatureCheck::Invalid);
    }

    #[test]
    fn unconfigured_secret_bypasses() {
        let v = SignatureVerifier::new(None);
        assert!(!v.is_enforcing());
        assert_eq!(v.verify(BODY, None), SignatureCheck::Bypassed);
        assert_eq!(v.verify(BODY, Some("sha256=deadbeef")), SignatureCheck::Bypassed);
        assert!(SignatureCheck::Bypassed.is_accepted());
        assert!(v.sign(BODY).is_none());
    }

    #[test]
    fn empty_secret_counts_as_unconfigured() {
        let v = SignatureVerifier::new(Some(SecretString::from("")));
        assert!(!v.is_enforcing());
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", verifier());
        assert!(!debug.contains("app-secret"));
    }
}
