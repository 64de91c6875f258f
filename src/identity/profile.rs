use serde::{Deserialize, Serialize};

use super::authorizer::Role;
use super::principal::AuthUser;
use crate::error::AppResult;
use crate::model::{Client, Worker};
use crate::store::ProfileStore;

/// Application profile behind an auth account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Worker(Worker),
    Client(Client),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Worker(w) => w.role,
            Profile::Client(_) => Role::Cliente,
        }
    }
}

/// Worker rows are matched on the login name (the canonical RUT); client rows on the
/// account id they were linked to.
pub async fn resolve_profile(store: &dyn ProfileStore, user: &AuthUser) -> AppResult<Option<Profile>> {
    if let Some(name) = user.login_name() {
        if let Some(worker) = store.find_worker_by_identity(name).await? {
            return Ok(Some(Profile::Worker(worker)));
        }
    }
    Ok(store.find_client_by_account(user.id).await?.map(Profile::Client))
}
