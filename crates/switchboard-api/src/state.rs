//! Application state wiring all services together.
//!
//! AppState holds the registry, message store, fanout, webhook router and
//! send service behind `Arc`s. It is cloned into every axum handler and
//! shared by CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};

use switchboard_core::event::EventFanout;
use switchboard_core::registry::AccountRegistry;
use switchboard_core::send::SendService;
use switchboard_core::store::MessageStore;
use switchboard_core::webhook::{SignatureVerifier, WebhookRouter};
use switchboard_infra::config::{load_relay_config, resolve_data_dir, seed_accounts};
use switchboard_infra::provider::GraphApiClient;
use switchboard_infra::sqlite::{DatabasePool, SqliteKvStore, database_url};
use switchboard_types::config::RelayConfig;

/// Process-wide channel capacity for `subscribe_updates` viewers.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Concrete type aliases for the SQLite-backed services.
pub type Registry = AccountRegistry<SqliteKvStore>;
pub type Store = MessageStore<SqliteKvStore>;
pub type Webhooks = WebhookRouter<SqliteKvStore>;
pub type Sender = SendService<SqliteKvStore, GraphApiClient>;

#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: Arc<RelayConfig>,
    pub registry: Arc<Registry>,
    pub store: Arc<Store>,
    pub fanout: Arc<EventFanout>,
    pub webhooks: Arc<Webhooks>,
    pub sender: Arc<Sender>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Resolve the data directory, load configuration, open the database and
    /// build every service.
    ///
    /// A database that cannot be opened is not fatal: the relay runs with
    /// in-memory state only.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_relay_config(&data_dir).await;
        let durable = open_durable(&data_dir).await;
        Self::build(config, durable, data_dir).await
    }

    /// Build the services from an already loaded configuration.
    pub async fn build(
        config: RelayConfig,
        durable: Option<Arc<SqliteKvStore>>,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(
            AccountRegistry::load(
                durable.clone(),
                seed_accounts(&config),
                config.default_account_id.clone(),
                config.unroutable_policy,
            )
            .await,
        );

        let store = Arc::new(
            MessageStore::new(durable)
                .with_retention(config.retention)
                .with_durable_timeout(Duration::from_millis(config.durable_timeout_ms)),
        );
        let fanout = Arc::new(EventFanout::new(UPDATE_CHANNEL_CAPACITY));

        let webhooks = Arc::new(WebhookRouter::new(
            registry.clone(),
            store.clone(),
            fanout.clone(),
            SignatureVerifier::new(config.app_secret.clone()),
            config.verify_token.clone(),
            config.object_tag.clone(),
        ));

        let provider = GraphApiClient::new(&config.provider).context("failed to build provider client")?;
        let sender = Arc::new(SendService::new(
            registry.clone(),
            store.clone(),
            fanout.clone(),
            Arc::new(provider),
            config.provider.template_name.clone(),
        ));

        tracing::info!(
            accounts = registry.len().await,
            default_account = %registry.default_account_id(),
            durable = store.has_durable(),
            "relay state ready"
        );

        Ok(Self {
            data_dir,
            config: Arc::new(config),
            registry,
            store,
            fanout,
            webhooks,
            sender,
            started_at: Utc::now(),
        })
    }
}

/// Open `{data_dir}/switchboard.db`, or `None` when it cannot be opened.
async fn open_durable(data_dir: &Path) -> Option<Arc<SqliteKvStore>> {
    let url = database_url(data_dir);
    match DatabasePool::new(&url).await {
        Ok(pool) => Some(Arc::new(SqliteKvStore::new(pool))),
        Err(e) => {
            tracing::warn!(error = %e, "failed to open database, running with in-memory state only");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use secrecy::SecretString;
    use switchboard_types::account::CreateAccountRequest;

    pub(crate) fn seeded_config() -> RelayConfig {
        let account = |id: &str, phone_id: &str, business_id: &str| CreateAccountRequest {
            id: id.to_string(),
            display_name: format!("{id} account"),
            secret_token: SecretString::from(format!("tok-{id}")),
            external_phone_id: phone_id.to_string(),
            external_business_id: business_id.to_string(),
            status: None,
        };
        RelayConfig {
            accounts: vec![
                account("main", "837445062775054", "2139592896448288"),
                account("secondary", "123456789012345", "9876543210987654"),
            ],
            ..Default::default()
        }
    }

    /// Memory-only state over the seeded accounts.
    pub(crate) async fn test_state(config: RelayConfig) -> AppState {
        AppState::build(config, None, PathBuf::from("/nonexistent")).await.unwrap()
    }

    #[tokio::test]
    async fn build_seeds_registry_without_database() {
        let state = test_state(seeded_config()).await;
        assert_eq!(state.registry.len().await, 2);
        assert_eq!(state.registry.default_account_id(), "main");
        assert!(!state.store.has_durable());
        assert!(!state.webhooks.verifier().is_enforcing());
    }

    #[tokio::test]
    async fn build_with_sqlite_persists_seeds() {
        let tmp = tempfile::TempDir::new().unwrap();
        let durable = open_durable(tmp.path()).await;
        assert!(durable.is_some());

        let state = AppState::build(seeded_config(), durable.clone(), tmp.path().to_path_buf())
            .await
            .unwrap();
        assert!(state.store.has_durable());

        // A second start with no seeds reads the persisted snapshot back.
        let reloaded = AppState::build(RelayConfig::default(), durable, tmp.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(reloaded.registry.len().await, 2);
    }
}
