use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::authorizer::Role;

/// Metadata attached to an auth account at sign-up, under the backend's field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMetadata {
    #[serde(rename = "nombre", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "rut", default, skip_serializing_if = "Option::is_none")]
    pub identity_number: Option<String>,
    #[serde(rename = "rol", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "user_metadata", default)]
    pub metadata: UserMetadata,
}

impl AuthUser {
    /// Local part of the login handle; for RUT logins this is the canonical RUT.
    pub fn login_name(&self) -> Option<&str> {
        self.email.as_deref().and_then(|e| e.split('@').next()).filter(|s| !s.is_empty())
    }
}
