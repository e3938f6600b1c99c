//! Account registry: the set of logical accounts and how deliveries and
//! sends are attributed to them.
//!
//! Reads take a shared lock. Mutations are serialized through a persist
//! mutex, applied in memory under the write lock, then written to the
//! durable store as a full snapshot under `accounts_registry`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use switchboard_types::account::{Account, AccountId, AccountPatch, AccountView};
use switchboard_types::config::UnroutablePolicy;
use switchboard_types::error::{RegistryError, RepositoryError};

use crate::storage::{DEFAULT_DURABLE_TIMEOUT, Durability, KvStore, bounded};

/// Durable key of the registry snapshot.
pub const REGISTRY_KEY: &str = "accounts_registry";

/// Which accounts `list` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountFilter {
    All,
    ActiveOnly,
}

/// Result of a registry mutation: the affected value plus whether the
/// snapshot reached the durable store. The in-memory change stands either way.
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    pub value: T,
    pub durability: Durability,
}

pub struct AccountRegistry<K: KvStore> {
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    persist_lock: Mutex<()>,
    durable: Option<Arc<K>>,
    default_id: AccountId,
    policy: UnroutablePolicy,
}

impl<K: KvStore> AccountRegistry<K> {
    /// Build a registry from the durable snapshot, or from `seed` when the
    /// snapshot is missing, unreadable or there is no durable store.
    ///
    /// Seeds are persisted immediately so the next start reads them back.
    pub async fn load(
        durable: Option<Arc<K>>,
        seed: Vec<Account>,
        default_id: impl Into<AccountId>,
        policy: UnroutablePolicy,
    ) -> Self {
        let default_id = default_id.into();
        let snapshot = match &durable {
            Some(kv) => match read_snapshot(kv.as_ref()).await {
                Ok(Some(accounts)) => Some(accounts),
                Ok(None) => {
                    tracing::info!("no account registry snapshot found, using configured accounts");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read account registry, using configured accounts");
                    None
                }
            },
            None => None,
        };

        let from_seed = snapshot.is_none();
        let accounts = snapshot.unwrap_or_else(|| {
            seed.into_iter()
                .map(|account| (account.id.clone(), account))
                .collect()
        });

        tracing::info!(
            accounts = accounts.len(),
            default_account = %default_id,
            ?policy,
            "account registry loaded"
        );

        let registry = Self {
            accounts: RwLock::new(accounts),
            persist_lock: Mutex::new(()),
            durable,
            default_id,
            policy,
        };

        if from_seed && registry.durable.is_some() {
            let _guard = registry.persist_lock.lock().await;
            let snapshot = registry.accounts.read().await.clone();
            registry.persist(&snapshot).await;
        }

        registry
    }

    /// Configured default account id.
    pub fn default_account_id(&self) -> &str {
        &self.default_id
    }

    pub fn policy(&self) -> UnroutablePolicy {
        self.policy
    }

    /// Attribute a delivery to an account by its provider phone id.
    ///
    /// Falls back according to the unroutable policy when no active account
    /// carries `external_phone_id`. The default account only receives the
    /// fallback while it is active.
    pub async fn resolve_by_phone_id(&self, external_phone_id: &str) -> Result<AccountId, RegistryError> {
        let accounts = self.accounts.read().await;
        if let Some(account) = accounts
            .values()
            .find(|a| a.is_active() && a.external_phone_id == external_phone_id)
        {
            return Ok(account.id.clone());
        }

        match self.policy {
            UnroutablePolicy::RouteToDefault if accounts.get(&self.default_id).is_some_and(Account::is_active) => {
                tracing::warn!(
                    phone_number_id = %external_phone_id,
                    default_account = %self.default_id,
                    "unknown phone number id, routing to default account"
                );
                Ok(self.default_id.clone())
            }
            UnroutablePolicy::RouteToDefault => {
                tracing::warn!(
                    phone_number_id = %external_phone_id,
                    default_account = %self.default_id,
                    "unknown phone number id and default account is not active"
                );
                Err(RegistryError::Unroutable(external_phone_id.to_string()))
            }
            UnroutablePolicy::Reject => Err(RegistryError::Unroutable(external_phone_id.to_string())),
        }
    }

    /// Exact match on both provider identifiers among active accounts.
    pub async fn resolve_by_ids(&self, business_id: &str, phone_id: &str) -> Result<AccountId, RegistryError> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| {
                a.is_active() && a.external_business_id == business_id && a.external_phone_id == phone_id
            })
            .map(|a| a.id.clone())
            .ok_or_else(|| RegistryError::AccountNotFound(format!("{business_id}/{phone_id}")))
    }

    pub async fn get(&self, id: &str) -> Result<Account, RegistryError> {
        self.accounts
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::AccountNotFound(id.to_string()))
    }

    /// Fetch an account that may send and receive.
    pub async fn get_active(&self, id: &str) -> Result<Account, RegistryError> {
        let account = self.get(id).await?;
        if !account.is_active() {
            return Err(RegistryError::AccountInactive(id.to_string()));
        }
        Ok(account)
    }

    /// Accounts sorted by id, without credentials.
    pub async fn list(&self, filter: AccountFilter) -> Vec<AccountView> {
        self.accounts
            .read()
            .await
            .values()
            .filter(|a| filter == AccountFilter::All || a.is_active())
            .map(Account::view)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    pub async fn add(&self, account: Account) -> Result<Mutation<AccountView>, RegistryError> {
        if account.id.trim().is_empty() {
            return Err(RegistryError::Invalid("account id must not be empty".to_string()));
        }
        if account.external_phone_id.trim().is_empty() {
            return Err(RegistryError::Invalid("phone number id must not be empty".to_string()));
        }

        let id = account.id.clone();
        self.mutate(|accounts| {
            if accounts.contains_key(&id) {
                return Err(RegistryError::DuplicateAccount(id.clone()));
            }
            let view = account.view();
            accounts.insert(id.clone(), account);
            Ok(view)
        })
        .await
        .inspect(|_| tracing::info!(account_id = %id, "account added"))
    }

    pub async fn update(&self, id: &str, patch: AccountPatch) -> Result<Mutation<AccountView>, RegistryError> {
        if patch.external_phone_id.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(RegistryError::Invalid("phone number id must not be empty".to_string()));
        }

        self.mutate(|accounts| {
            let account = accounts
                .get_mut(id)
                .ok_or_else(|| RegistryError::AccountNotFound(id.to_string()))?;
            account.apply(patch);
            Ok(account.view())
        })
        .await
        .inspect(|_| tracing::info!(account_id = %id, "account updated"))
    }

    /// Remove an account. The default account is protected.
    pub async fn remove(&self, id: &str) -> Result<Mutation<AccountView>, RegistryError> {
        if id == self.default_id {
            return Err(RegistryError::ProtectedAccount(id.to_string()));
        }

        self.mutate(|accounts| {
            accounts
                .remove(id)
                .map(|a| a.view())
                .ok_or_else(|| RegistryError::AccountNotFound(id.to_string()))
        })
        .await
        .inspect(|_| tracing::info!(account_id = %id, "account removed"))
    }

    /// Flush a final snapshot.
    pub async fn shutdown(&self) -> Durability {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.accounts.read().await.clone();
        self.persist(&snapshot).await
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<AccountId, Account>) -> Result<T, RegistryError>,
    ) -> Result<Mutation<T>, RegistryError> {
        let _guard = self.persist_lock.lock().await;

        let (value, snapshot) = {
            let mut accounts = self.accounts.write().await;
            let value = apply(&mut accounts)?;
            (value, accounts.clone())
        };

        let durability = self.persist(&snapshot).await;
        Ok(Mutation { value, durability })
    }

    async fn persist(&self, snapshot: &BTreeMap<AccountId, Account>) -> Durability {
        let Some(kv) = &self.durable else {
            return Durability::Unavailable;
        };

        let result = match serde_json::to_value(snapshot) {
            Ok(value) => bounded(DEFAULT_DURABLE_TIMEOUT, kv.set(REGISTRY_KEY, &value)).await,
            Err(e) => Err(RepositoryError::Serialization(e.to_string())),
        };

        match result {
            Ok(()) => Durability::Durable,
            Err(e) => {
                tracing::error!(error = %e, "failed to persist account registry");
                Durability::MemoryOnly(e.to_string())
            }
        }
    }
}

async fn read_snapshot<K: KvStore>(kv: &K) -> Result<Option<BTreeMap<AccountId, Account>>, RepositoryError> {
    let Some(value) = bounded(DEFAULT_DURABLE_TIMEOUT, kv.get(REGISTRY_KEY)).await? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))
}

impl<K: KvStore> std::fmt::Debug for AccountRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry")
            .field("default_id", &self.default_id)
            .field("policy", &self.policy)
            .field("durable", &self.durable.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::testing::{FailingKv, MemoryKv};
    use secrecy::SecretString;
    use switchboard_types::account::{AccountStatus, CreateAccountRequest};

    pub(crate) fn account(id: &str, phone_id: &str, business_id: &str) -> Account {
        CreateAccountRequest {
            id: id.to_string(),
            display_name: format!("{id} account"),
            secret_token: SecretString::from(format!("token-{id}")),
            external_phone_id: phone_id.to_string(),
            external_business_id: business_id.to_string(),
            status: None,
        }
        .into_account()
    }

    pub(crate) fn seed() -> Vec<Account> {
        vec![
            account("main", "837445062775054", "2139592896448288"),
            account("secondary", "123456789012345", "9876543210987654"),
        ]
    }

    pub(crate) async fn memory_registry(policy: UnroutablePolicy) -> AccountRegistry<MemoryKv> {
        AccountRegistry::load(Some(Arc::new(MemoryKv::default())), seed(), "main", policy).await
    }

    #[tokio::test]
    async fn resolves_each_account_by_phone_id() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        assert_eq!(registry.resolve_by_phone_id("837445062775054").await.unwrap(), "main");
        assert_eq!(registry.resolve_by_phone_id("123456789012345").await.unwrap(), "secondary");
    }

    #[tokio::test]
    async fn unknown_phone_id_falls_back_to_default() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        assert_eq!(registry.resolve_by_phone_id("000").await.unwrap(), "main");
    }

    #[tokio::test]
    async fn unknown_phone_id_rejected_under_reject_policy() {
        let registry = memory_registry(UnroutablePolicy::Reject).await;
        let err = registry.resolve_by_phone_id("000").await.unwrap_err();
        assert_eq!(err, RegistryError::Unroutable("000".to_string()));
    }

    #[tokio::test]
    async fn inactive_account_is_not_resolved() {
        let registry = memory_registry(UnroutablePolicy::Reject).await;
        registry
            .update(
                "secondary",
                AccountPatch {
                    status: Some(AccountStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(registry.resolve_by_phone_id("123456789012345").await.is_err());
        assert_eq!(
            registry.get_active("secondary").await.unwrap_err(),
            RegistryError::AccountInactive("secondary".to_string())
        );
        assert!(registry.get("secondary").await.is_ok());
    }

    #[tokio::test]
    async fn inactive_default_does_not_take_fallback() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        registry
            .update(
                "main",
                AccountPatch {
                    status: Some(AccountStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            registry.resolve_by_phone_id("000").await.unwrap_err(),
            RegistryError::Unroutable("000".to_string())
        );
        assert!(registry.resolve_by_phone_id("837445062775054").await.is_err());
        assert_eq!(registry.resolve_by_phone_id("123456789012345").await.unwrap(), "secondary");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_see_consistent_state_during_mutations() {
        let registry = Arc::new(memory_registry(UnroutablePolicy::Reject).await);

        let mut readers = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    // The default account is never touched by the writer.
                    assert_eq!(registry.resolve_by_phone_id("837445062775054").await.unwrap(), "main");
                    // The churned account either resolves to itself or not at all.
                    match registry.resolve_by_phone_id("555").await {
                        Ok(id) => assert_eq!(id, "churn"),
                        Err(e) => assert_eq!(e, RegistryError::Unroutable("555".to_string())),
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        let writer = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    registry.add(account("churn", "555", "666")).await.unwrap();
                    registry
                        .update(
                            "churn",
                            AccountPatch {
                                display_name: Some(format!("churn {i}")),
                                ..Default::default()
                            },
                        )
                        .await
                        .unwrap();
                    registry.remove("churn").await.unwrap();
                }
            })
        };

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(registry.len().await, 2);
        assert!(matches!(registry.get("churn").await, Err(RegistryError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn resolve_by_ids_requires_exact_pair() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        assert_eq!(
            registry
                .resolve_by_ids("9876543210987654", "123456789012345")
                .await
                .unwrap(),
            "secondary"
        );
        assert!(matches!(
            registry.resolve_by_ids("2139592896448288", "123456789012345").await,
            Err(RegistryError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_empty_fields() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        assert_eq!(
            registry.add(account("main", "1", "2")).await.unwrap_err(),
            RegistryError::DuplicateAccount("main".to_string())
        );
        assert!(matches!(
            registry.add(account("third", "", "2")).await,
            Err(RegistryError::Invalid(_))
        ));

        let added = registry.add(account("third", "555", "666")).await.unwrap();
        assert_eq!(added.value.id, "third");
        assert!(added.durability.is_durable());
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn default_account_is_protected() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        assert_eq!(
            registry.remove("main").await.unwrap_err(),
            RegistryError::ProtectedAccount("main".to_string())
        );
    }

    #[tokio::test]
    async fn removed_account_is_gone() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        registry.remove("secondary").await.unwrap();
        assert_eq!(
            registry.get("secondary").await.unwrap_err(),
            RegistryError::AccountNotFound("secondary".to_string())
        );
        assert!(matches!(
            registry.remove("secondary").await,
            Err(RegistryError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_inactive_and_sorts_by_id() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        registry.add(account("alpha", "999", "888")).await.unwrap();
        registry
            .update(
                "alpha",
                AccountPatch {
                    status: Some(AccountStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let all: Vec<_> = registry.list(AccountFilter::All).await.into_iter().map(|a| a.id).collect();
        assert_eq!(all, vec!["alpha", "main", "secondary"]);

        let active: Vec<_> = registry
            .list(AccountFilter::ActiveOnly)
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(active, vec!["main", "secondary"]);
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let kv = Arc::new(MemoryKv::default());
        let registry =
            AccountRegistry::load(Some(kv.clone()), seed(), "main", UnroutablePolicy::RouteToDefault).await;
        registry.add(account("third", "555", "666")).await.unwrap();

        // Seed is ignored once a snapshot exists.
        let reloaded = AccountRegistry::load(Some(kv), Vec::new(), "main", UnroutablePolicy::RouteToDefault).await;
        assert_eq!(reloaded.len().await, 3);
        assert_eq!(reloaded.resolve_by_phone_id("555").await.unwrap(), "third");
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_change() {
        let registry =
            AccountRegistry::load(Some(Arc::new(FailingKv)), seed(), "main", UnroutablePolicy::RouteToDefault)
                .await;
        assert_eq!(registry.len().await, 2);

        let added = registry.add(account("third", "555", "666")).await.unwrap();
        assert!(matches!(added.durability, Durability::MemoryOnly(_)));
        assert!(registry.get("third").await.is_ok());
    }

    #[tokio::test]
    async fn no_durable_store_reports_unavailable() {
        let registry: AccountRegistry<MemoryKv> =
            AccountRegistry::load(None, seed(), "main", UnroutablePolicy::RouteToDefault).await;
        let removed = registry.remove("secondary").await.unwrap();
        assert_eq!(removed.durability, Durability::Unavailable);
        assert_eq!(registry.shutdown().await, Durability::Unavailable);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let registry = memory_registry(UnroutablePolicy::RouteToDefault).await;
        let updated = registry
            .update(
                "secondary",
                AccountPatch {
                    display_name: Some("Support line".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.value.name, "Support line");
        assert_eq!(updated.value.phone_number_id, "123456789012345");

        assert!(matches!(
            registry.update("ghost", AccountPatch::default()).await,
            Err(RegistryError::AccountNotFound(_))
        ));
    }
}
