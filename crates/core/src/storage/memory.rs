use super::{KeyValueStorage, StorageError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process storage backed by a `HashMap`
///
/// Batch operations run under a single lock acquisition, so readers never see
/// a half-written session. An optional byte quota emulates the browser's
/// `QuotaExceededError`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects writes past `quota_bytes`
    ///
    /// Usage is counted as the sum of key and value lengths.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_quota(
        &self,
        items: &HashMap<String, String>,
        entries: &[(&str, &str)],
    ) -> Result<(), StorageError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };

        let mut used: usize = items
            .iter()
            .filter(|(key, _)| !entries.iter().any(|(k, _)| *k == key.as_str()))
            .map(|(key, value)| key.len() + value.len())
            .sum();
        used += entries
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum::<usize>();

        if used > quota {
            return Err(StorageError::QuotaExceeded);
        }
        Ok(())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.lock();
        self.check_quota(&items, &[(key, value)])?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn set_items(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError> {
        let mut items = self.lock();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        self.check_quota(&items, &borrowed)?;
        for (key, value) in entries {
            items.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let mut items = self.lock();
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}
