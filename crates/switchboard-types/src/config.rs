//! Global configuration types for Switchboard.
//!
//! `RelayConfig` represents the top-level `config.toml` in the data directory.
//! Every field has a default so an empty file (or no file) yields a working
//! single-account setup once an account is registered.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::account::{AccountId, CreateAccountRequest};
use crate::message::DEFAULT_RETENTION;

/// Top-level configuration for the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Token expected in `hub.verify_token` during subscription handshakes.
    #[serde(default = "default_verify_token")]
    pub verify_token: String,

    /// Shared secret for `X-Hub-Signature-256`. `None` disables verification.
    #[serde(default, deserialize_with = "crate::secret::deserialize_option")]
    pub app_secret: Option<SecretString>,

    /// Account used when a delivery's phone id matches nothing, and for
    /// sends that do not name an account. Protected from deletion.
    #[serde(default = "default_account_id")]
    pub default_account_id: AccountId,

    #[serde(default)]
    pub unroutable_policy: UnroutablePolicy,

    /// Expected top-level `object` tag of delivery payloads.
    #[serde(default = "default_object_tag")]
    pub object_tag: String,

    /// Maximum messages kept per conversation.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Upper bound on a single durable write before it is treated as failed.
    #[serde(default = "default_durable_timeout_ms")]
    pub durable_timeout_ms: u64,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Directory holding the static chat UI. Served as the router fallback.
    #[serde(default)]
    pub web_dir: Option<PathBuf>,

    /// Seed accounts, used when the durable registry snapshot is absent.
    #[serde(default)]
    pub accounts: Vec<CreateAccountRequest>,
}

fn default_verify_token() -> String {
    "whatsapp_verify_token".to_string()
}

fn default_account_id() -> AccountId {
    "main".to_string()
}

fn default_object_tag() -> String {
    "whatsapp_business_account".to_string()
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

fn default_durable_timeout_ms() -> u64 {
    2_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            verify_token: default_verify_token(),
            app_secret: None,
            default_account_id: default_account_id(),
            unroutable_policy: UnroutablePolicy::default(),
            object_tag: default_object_tag(),
            retention: default_retention(),
            durable_timeout_ms: default_durable_timeout_ms(),
            provider: ProviderConfig::default(),
            web_dir: None,
            accounts: Vec::new(),
        }
    }
}

/// What to do with a delivery whose phone id matches no active account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnroutablePolicy {
    /// Store under the default account.
    #[default]
    RouteToDefault,
    /// Skip the change and log it as unroutable.
    Reject,
}

/// Outbound provider (Graph API) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Template used for `type: "template"` sends (first contact).
    #[serde(default = "default_template_name")]
    pub template_name: String,
    #[serde(default = "default_template_language")]
    pub template_language: String,
}

fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_template_name() -> String {
    "hello_world".to_string()
}

fn default_template_language() -> String {
    "en_US".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            template_name: default_template_name(),
            template_language: default_template_language(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.default_account_id, "main");
        assert_eq!(config.retention, 100);
        assert_eq!(config.unroutable_policy, UnroutablePolicy::RouteToDefault);
        assert!(config.app_secret.is_none());
        assert_eq!(config.provider.api_version, "v18.0");
    }

    #[test]
    fn test_relay_config_deserialize_empty() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.object_tag, "whatsapp_business_account");
        assert_eq!(config.durable_timeout_ms, 2_000);
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_relay_config_deserialize_with_values() {
        let toml_str = r#"
verify_token = "tok"
app_secret = "shh"
default_account_id = "primary"
unroutable_policy = "reject"
retention = 50

[provider]
timeout_secs = 5

[[accounts]]
id = "primary"
display_name = "Primary"
secret_token = "EAAG"
external_phone_id = "111"
external_business_id = "222"

[[accounts]]
id = "secondary"
name = "Secondary"
token = "EAAH"
phone_number_id = "333"
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.verify_token, "tok");
        assert!(config.app_secret.is_some());
        assert_eq!(config.unroutable_policy, UnroutablePolicy::Reject);
        assert_eq!(config.retention, 50);
        assert_eq!(config.provider.timeout_secs, 5);
        assert_eq!(config.provider.template_name, "hello_world");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[1].external_phone_id, "333");
        assert_eq!(config.accounts[1].external_business_id, "");
    }

    #[test]
    fn test_empty_app_secret_means_unset() {
        let config: RelayConfig = toml::from_str(r#"app_secret = """#).unwrap();
        assert!(config.app_secret.is_none());
    }
}
