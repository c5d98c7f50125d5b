//! Auth state store
//!
//! [`SessionStore`] is the only reader and writer of the persisted session
//! keys. Every operation is synchronous and local: it talks to the injected
//! [`KeyValueStorage`] and [`Clock`], never to the network.
//!
//! A session is the `(token, user, expiry)` triple. The token and expiry are
//! always written in the same storage batch, and the user joins that batch
//! whenever it changes alongside the token.

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::keys::StorageKeys;
use crate::storage::KeyValueStorage;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Snapshot of a complete persisted session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: JsonValue,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Persisted session state
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    keys: StorageKeys,
    ttl: TimeDelta,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store with the system clock and a one hour TTL
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            keys: StorageKeys::CURRENT,
            ttl: TimeDelta::hours(1),
        }
    }

    /// Create a store with an explicit clock and configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn with_config(
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        config: &SessionConfig,
    ) -> CoreResult<Self> {
        Ok(Self {
            storage,
            clock,
            keys: StorageKeys::CURRENT,
            ttl: config.ttl()?,
        })
    }

    /// Use a different key layout
    #[must_use]
    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    /// The key layout this store reads and writes
    pub const fn keys(&self) -> StorageKeys {
        self.keys
    }

    /// Persist a new session, stamping the expiry as `now + ttl`
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty, the user cannot be serialized,
    /// or the storage write fails. A failed write is not retried.
    pub fn set_session<U>(&self, token: &str, user: &U) -> CoreResult<()>
    where
        U: Serialize + ?Sized,
    {
        if token.is_empty() {
            return Err(CoreError::invalid_record("bearer token must not be empty"));
        }
        let user = serde_json::to_string(user)?;

        self.storage.set_items(&[
            (self.keys.token, token.to_string()),
            (self.keys.user, user),
            (self.keys.expiry, self.next_expiry()),
        ])?;
        debug!("Session stored");
        Ok(())
    }

    /// Current bearer token
    pub fn get_token(&self) -> Option<String> {
        match self.storage.get_item(self.keys.token) {
            Ok(token) => token,
            Err(err) => {
                warn!("Failed to read session token: {err}");
                None
            }
        }
    }

    /// Current user record
    ///
    /// A record that fails to parse is logged and treated as absent. Use
    /// [`Self::try_get_user`] to see the failure instead.
    pub fn get_user(&self) -> Option<JsonValue> {
        match self.try_get_user() {
            Ok(user) => user,
            Err(err @ CoreError::CorruptRecord { .. }) => {
                error!("{err}");
                None
            }
            Err(err) => {
                warn!("Failed to read session user: {err}");
                None
            }
        }
    }

    /// Current user record, surfacing storage and decode failures
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if the stored record is not valid
    /// JSON, or a storage error if the backend cannot be read
    pub fn try_get_user(&self) -> CoreResult<Option<JsonValue>> {
        let Some(raw) = self.storage.get_item(self.keys.user)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CoreError::corrupt_record(self.keys.user, e.to_string()))
    }

    /// Current user record decoded into an application type
    pub fn get_user_as<T: DeserializeOwned>(&self) -> Option<T> {
        let user = self.get_user()?;
        match serde_json::from_value(user) {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!("Stored user does not match the requested shape: {err}");
                None
            }
        }
    }

    /// Stored expiry, if present and well formed
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = match self.storage.get_item(self.keys.expiry) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Failed to read session expiry: {err}");
                return None;
            }
        };
        let millis = raw.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// True when no usable expiry is stored or the clock has reached it
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_none_or(|expires_at| self.clock.now() >= expires_at)
    }

    /// Token and user present and not expired
    pub fn is_valid(&self) -> bool {
        self.get_token().is_some() && self.get_user().is_some() && !self.is_expired()
    }

    /// Full snapshot of the persisted session
    pub fn load(&self) -> Option<Session> {
        Some(Session {
            token: self.get_token()?,
            user: self.get_user()?,
            expires_at: self.expires_at()?,
        })
    }

    /// Remove token, user and expiry together
    ///
    /// Clearing an empty session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend rejects the removal
    pub fn clear_session(&self) -> CoreResult<()> {
        self.storage.remove_items(&self.keys.all())?;
        debug!("Session cleared");
        Ok(())
    }

    /// Shallow-merge `patch` onto the stored user
    ///
    /// Returns the merged record, or `None` when no user is stored. Token and
    /// expiry are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored user or the patch is not a JSON object,
    /// or if the write fails
    pub fn merge_user(&self, patch: &JsonValue) -> CoreResult<Option<JsonValue>> {
        let Some(current) = self.get_user() else {
            return Ok(None);
        };
        let merged = shallow_merge(current, patch)?;
        self.storage
            .set_item(self.keys.user, &serde_json::to_string(&merged)?)?;
        Ok(Some(merged))
    }

    /// Replace the token and restart the expiry window, keeping the user
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the write fails
    pub fn renew(&self, token: &str) -> CoreResult<()> {
        if token.is_empty() {
            return Err(CoreError::invalid_record("bearer token must not be empty"));
        }
        self.storage.set_items(&[
            (self.keys.token, token.to_string()),
            (self.keys.expiry, self.next_expiry()),
        ])?;
        debug!("Session token renewed");
        Ok(())
    }

    /// Replace the token and merge a user patch in one write
    ///
    /// This is the profile-update step: the API answers an update with a
    /// fresh token and the changed user fields. If no user is stored the patch
    /// becomes the new user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty, either record is not a JSON
    /// object, or the write fails
    pub fn apply_update(&self, token: &str, patch: &JsonValue) -> CoreResult<JsonValue> {
        if token.is_empty() {
            return Err(CoreError::invalid_record("bearer token must not be empty"));
        }
        let user = match self.get_user() {
            Some(current) => shallow_merge(current, patch)?,
            None => patch.clone(),
        };
        self.storage.set_items(&[
            (self.keys.token, token.to_string()),
            (self.keys.user, serde_json::to_string(&user)?),
            (self.keys.expiry, self.next_expiry()),
        ])?;
        Ok(user)
    }

    fn next_expiry(&self) -> String {
        (self.clock.now() + self.ttl)
            .timestamp_millis()
            .to_string()
    }
}

fn shallow_merge(current: JsonValue, patch: &JsonValue) -> CoreResult<JsonValue> {
    let JsonValue::Object(mut base) = current else {
        return Err(CoreError::invalid_record("stored user is not a JSON object"));
    };
    let JsonValue::Object(patch) = patch else {
        return Err(CoreError::invalid_record("user patch is not a JSON object"));
    };
    for (key, value) in patch {
        base.insert(key.clone(), value.clone());
    }
    Ok(JsonValue::Object(base))
}
