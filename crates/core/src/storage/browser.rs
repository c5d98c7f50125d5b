use super::{KeyValueStorage, StorageError, restore};
use web_sys::Storage;

/// `window.localStorage`
///
/// The handle is looked up on every call; the browser owns the data and its
/// quota. The Web Storage API has no transaction primitive, so a batch write
/// snapshots the keys first and restores them if any write fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
    pub fn new() -> Self {
        Self
    }
}

fn local_storage() -> Result<Storage, StorageError> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .ok_or_else(|| StorageError::Unavailable("window.localStorage is not accessible".into()))
}

fn js_error(err: &wasm_bindgen::JsValue) -> StorageError {
    let message = format!("{err:?}");
    if message.contains("QuotaExceeded") {
        StorageError::QuotaExceeded
    } else {
        StorageError::Backend(message)
    }
}

impl KeyValueStorage for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        local_storage()?.get_item(key).map_err(|e| js_error(&e))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        local_storage()?.set_item(key, value).map_err(|e| js_error(&e))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        local_storage()?.remove_item(key).map_err(|e| js_error(&e))
    }

    fn set_items(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError> {
        let storage = local_storage()?;
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push((*key, storage.get_item(key).map_err(|e| js_error(&e))?));
        }

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = storage.set_item(key, value) {
                restore(self, &previous[..written]);
                return Err(js_error(&err));
            }
        }
        Ok(())
    }
}
