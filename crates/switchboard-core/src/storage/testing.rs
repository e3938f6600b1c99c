//! In-memory and failing `KvStore` doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use switchboard_types::error::RepositoryError;

use super::KvStore;

#[derive(Default)]
pub struct MemoryKv {
    values: Mutex<HashMap<String, serde_json::Value>>,
    lists: Mutex<HashMap<String, VecDeque<serde_json::Value>>>,
    pub writes: AtomicUsize,
}

impl MemoryKv {
    pub fn list_len(&self, key: &str) -> usize {
        self.lists.lock().unwrap().get(key).map_or(0, VecDeque::len)
    }
}

impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.values.lock().unwrap().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.values.lock().unwrap().remove(key);
        self.lists.lock().unwrap().remove(key);
        Ok(())
    }

    async fn push_front(
        &self,
        key: &str,
        value: &serde_json::Value,
        max_len: usize,
    ) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut lists = self.lists.lock().unwrap();
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value.clone());
        list.truncate(max_len);
        Ok(())
    }

    async fn list(&self, key: &str, limit: usize) -> Result<Vec<serde_json::Value>, RepositoryError> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(key)
            .map(|l| l.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Every call fails with a query error.
#[derive(Default)]
pub struct FailingKv;

fn down() -> RepositoryError {
    RepositoryError::Query("disk I/O error".to_string())
}

impl KvStore for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        Err(down())
    }

    async fn set(&self, _key: &str, _value: &serde_json::Value) -> Result<(), RepositoryError> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> Result<(), RepositoryError> {
        Err(down())
    }

    async fn push_front(
        &self,
        _key: &str,
        _value: &serde_json::Value,
        _max_len: usize,
    ) -> Result<(), RepositoryError> {
        Err(down())
    }

    async fn list(&self, _key: &str, _limit: usize) -> Result<Vec<serde_json::Value>, RepositoryError> {
        Err(down())
    }
}
