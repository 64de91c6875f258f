use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::principal::AuthUser;

pub type SessionToken = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: SessionToken,
    #[serde(default)]
    pub refresh_token: Option<SessionToken>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// Whether a store outlives the client that writes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    /// The application's ambient authentication context.
    Persistent,
    /// In-memory only, never refreshed; dropped with its client.
    Ephemeral,
}

/// Shared slot holding the session a client authenticates with.
///
/// Clones share the same slot. Identity clients write the session they obtain on
/// sign-in or sign-up here, so provisioning code that must not clobber the operator
/// works against an `ephemeral()` store instead of the ambient one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    slot: Arc<RwLock<Option<Session>>>,
    scope: SessionScope,
}

impl Default for SessionStore {
    fn default() -> Self { Self::persistent() }
}

impl SessionStore {
    pub fn persistent() -> Self {
        Self { slot: Arc::new(RwLock::new(None)), scope: SessionScope::Persistent }
    }

    pub fn ephemeral() -> Self {
        Self { slot: Arc::new(RwLock::new(None)), scope: SessionScope::Ephemeral }
    }

    pub fn scope(&self) -> SessionScope { self.scope }

    pub fn get(&self) -> Option<Session> { self.slot.read().clone() }

    pub fn set(&self, session: Session) {
        tracing::debug!(target: "auth", scope = ?self.scope, user = %session.user.id, "session.set");
        *self.slot.write() = Some(session);
    }

    /// Empty the slot, returning whatever was there.
    pub fn clear(&self) -> Option<Session> {
        let prev = self.slot.write().take();
        if let Some(s) = &prev {
            tracing::debug!(target: "auth", scope = ?self.scope, user = %s.user.id, "session.clear");
        }
        prev
    }

    pub fn access_token(&self) -> Option<SessionToken> {
        self.slot.read().as_ref().map(|s| s.access_token.clone())
    }
}
