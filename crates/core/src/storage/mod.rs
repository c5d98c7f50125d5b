//! Key-value storage capability
//!
//! The session store never touches a host storage global directly. It goes
//! through [`KeyValueStorage`], which mirrors the `localStorage` surface
//! (`getItem`/`setItem`/`removeItem`) plus multi-key writes that backends can
//! make all-or-nothing.

mod file;
mod memory;

#[cfg(target_arch = "wasm32")]
mod browser;

pub use file::FileStorage;
pub use memory::MemoryStorage;

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStorage;

use thiserror::Error;
use tracing::warn;

/// Storage backend failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The host has no storage available (private mode, no window, ...)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A write would exceed the backend's quota; the write was not applied
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// Backend rejected the operation
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Filesystem error from a file-backed store
    #[error("Storage IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull => Self::QuotaExceeded,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Synchronous string key-value storage
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStorage: Send + Sync {
    /// Read a value, `None` if the key is not set
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a single value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Write several values as one operation
    ///
    /// The default snapshots every key, writes one key at a time and, if a
    /// write fails, puts the keys already written back to their previous
    /// values before returning the error. Backends that can apply the batch
    /// atomically should override it.
    fn set_items(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError> {
        let previous = entries
            .iter()
            .map(|(key, _)| Ok((*key, self.get_item(key)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = self.set_item(key, value) {
                restore(self, &previous[..written]);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove several keys as one operation
    ///
    /// The default attempts every key and reports the first failure, so a
    /// failing key never leaves the others behind.
    fn remove_items(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.remove_item(key) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Put `previous` values back after a failed batch, newest first
fn restore<S>(storage: &S, previous: &[(&'static str, Option<String>)])
where
    S: KeyValueStorage + ?Sized,
{
    for (key, value) in previous.iter().rev() {
        let result = match value {
            Some(value) => storage.set_item(key, value),
            None => storage.remove_item(key),
        };
        if let Err(err) = result {
            warn!(key = *key, "Failed to roll back partial write: {err}");
        }
    }
}
