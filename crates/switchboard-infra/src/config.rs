//! Configuration loader for Switchboard.
//!
//! Reads `config.toml` from the data directory (`~/.switchboard/` in
//! production) into [`RelayConfig`], then applies `SWITCHBOARD_*`
//! environment overrides. Falls back to defaults when the file is missing
//! or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use switchboard_types::account::Account;
use switchboard_types::config::RelayConfig;

pub const ENV_DATA_DIR: &str = "SWITCHBOARD_DATA_DIR";
pub const ENV_VERIFY_TOKEN: &str = "SWITCHBOARD_VERIFY_TOKEN";
pub const ENV_APP_SECRET: &str = "SWITCHBOARD_APP_SECRET";
pub const ENV_DEFAULT_ACCOUNT: &str = "SWITCHBOARD_DEFAULT_ACCOUNT";
pub const ENV_WEB_DIR: &str = "SWITCHBOARD_WEB_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `SWITCHBOARD_DATA_DIR` environment variable
/// 2. `~/.switchboard`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".switchboard");
    }

    // Last resort: current directory
    PathBuf::from(".switchboard")
}

/// Load `{data_dir}/config.toml` and apply environment overrides.
pub async fn load_relay_config(data_dir: &Path) -> RelayConfig {
    let config = read_config_file(data_dir).await;
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Parse `{data_dir}/config.toml` without environment overrides.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn read_config_file(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            RelayConfig::default()
        }
    }
}

/// Overlay `SWITCHBOARD_*` variables read through `lookup`. Empty values are ignored.
pub fn apply_env_overrides(
    mut config: RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> RelayConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(token) = get(ENV_VERIFY_TOKEN) {
        config.verify_token = token;
    }
    if let Some(secret) = get(ENV_APP_SECRET) {
        config.app_secret = Some(SecretString::from(secret));
    }
    if let Some(default_account) = get(ENV_DEFAULT_ACCOUNT) {
        config.default_account_id = default_account;
    }
    if let Some(dir) = get(ENV_WEB_DIR) {
        config.web_dir = Some(PathBuf::from(dir));
    }
    config
}

/// Accounts declared under `[[accounts]]`, used to seed an empty registry.
pub fn seed_accounts(config: &RelayConfig) -> Vec<Account> {
    config
        .accounts
        .iter()
        .cloned()
        .map(|request| request.into_account())
        .collect()
}
