//! Contact address canonicalization.
//!
//! Canonical phones are digit-only strings carrying the `234` country prefix
//! where a local form can be recognized. Every key into the message store is
//! normalizer output.

/// Country prefix applied to recognized local numbers.
pub const COUNTRY_PREFIX: &str = "234";

/// Canonicalize a raw contact address.
///
/// Strips every non-digit, then:
/// - digits starting with `234` are returned as-is;
/// - an 11-digit number with a leading `0` has the `0` replaced by `234`;
/// - a 10-digit number gets `234` prepended;
/// - anything else is returned as the bare digits.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.starts_with(COUNTRY_PREFIX) {
        digits
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("{COUNTRY_PREFIX}{}", &digits[1..])
    } else if digits.len() == 10 {
        format!("{COUNTRY_PREFIX}{digits}")
    } else {
        digits
    }
}

/// Destination string handed to the provider (digits only, no `+`).
pub fn format_for_provider(raw: &str) -> String {
    normalize(raw)
}

/// Last four digits of a phone, used for derived contact names.
pub fn display_suffix(phone: &str) -> &str {
    let start = phone.len().saturating_sub(4);
    phone.get(start..).unwrap_or(phone)
}

/// Derived display name for a contact with no stored profile.
pub fn contact_name(phone: &str) -> String {
    format!("Contact {}", display_suffix(phone))
}
