//! Session configuration

use crate::error::{CoreError, CoreResult};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Client-side session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime stamped on a session when it is written, in seconds
    ///
    /// This is the client's own estimate; the server may expire the token
    /// earlier, which the gateway handles through the refresh flow.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

const fn default_ttl_secs() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl SessionConfig {
    /// Check the settings are usable
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is zero or does not fit a timestamp delta
    pub fn validate(&self) -> CoreResult<()> {
        self.ttl().map(|_| ())
    }

    /// The TTL as a chrono delta
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is zero or out of range
    pub fn ttl(&self) -> CoreResult<TimeDelta> {
        if self.ttl_secs == 0 {
            return Err(CoreError::invalid_config("session.ttl_secs must be positive"));
        }
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| CoreError::invalid_config("session.ttl_secs is out of range"))
    }
}
