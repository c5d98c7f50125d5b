//! Persisted session layout

/// Storage key names for one version of the session schema
///
/// Read and write sites both go through these constants; the strings never
/// appear inline anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageKeys {
    pub version: u32,
    /// Bearer token, stored as a plain string
    pub token: &'static str,
    /// JSON-serialized user record
    pub user: &'static str,
    /// Expiry as decimal epoch milliseconds
    pub expiry: &'static str,
}

impl StorageKeys {
    /// The layout shared with the existing browser client
    pub const V1: Self = Self {
        version: 1,
        token: "token",
        user: "user",
        expiry: "tokenExpiry",
    };

    /// Layout used when none is configured
    pub const CURRENT: Self = Self::V1;

    /// Every key owned by the session, in write order
    pub const fn all(&self) -> [&'static str; 3] {
        [self.token, self.user, self.expiry]
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::CURRENT
    }
}
