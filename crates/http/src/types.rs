//! Wire types for the session endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of a successful `POST /api/users/refresh`
///
/// The token is optional here so a body without it decodes and can be
/// reported as a missing token rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: JsonValue,
}

/// Credentials accepted by the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
