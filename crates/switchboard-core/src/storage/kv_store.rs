//! Key-value store trait.
//!
//! Defines the durable storage port used by the message store and the
//! account registry. Implementations live in switchboard-infra.

use std::future::Future;
use std::time::Duration;

use switchboard_types::error::RepositoryError;

/// Upper bound on a single durable call when the caller has no configured value.
pub const DEFAULT_DURABLE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Trait for the durable key-value store.
///
/// Holds plain JSON values and newest-first JSON lists under string keys.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key and any list stored under it. No-op if absent.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Push `value` to the front of the list at `key`, then trim the list to
    /// at most `max_len` items (oldest dropped).
    fn push_front(
        &self,
        key: &str,
        value: &serde_json::Value,
        max_len: usize,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Read up to `limit` items of the list at `key`, newest first. A missing
    /// key yields an empty list.
    fn list(
        &self,
        key: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, RepositoryError>> + Send;
}

/// Run a durable call with an upper bound. Elapsing maps to
/// [`RepositoryError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout(limit.as_millis() as u64)),
    }
}

/// Outcome of the durable half of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    /// Written to the durable store.
    Durable,
    /// Durable write failed or timed out; the change lives only in memory.
    MemoryOnly(String),
    /// No durable store is configured.
    Unavailable,
    /// Nothing was written (e.g. a duplicate append).
    Skipped,
}

impl Durability {
    pub fn is_durable(&self) -> bool {
        matches!(self, Durability::Durable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_result() {
        let out = bounded(Duration::from_millis(50), async { Ok::<_, RepositoryError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_maps_elapsed_to_timeout() {
        let out = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;
        assert!(matches!(out, Err(RepositoryError::Timeout(10))));
    }
}
