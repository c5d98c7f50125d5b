use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Typed view of the stored user record
///
/// The API owns the record's shape; only the identity, display fields and role
/// flags are named here. Everything else is carried in `extra` so a typed
/// round trip never drops fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalUser {
    /// Identity, numeric or string depending on the API
    pub id: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(default, rename = "isStaff")]
    pub is_staff: bool,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl PortalUser {
    /// Whether the user may see clinical staff screens
    pub const fn has_staff_access(&self) -> bool {
        self.is_admin || self.is_staff
    }
}
