use std::sync::Arc;

use tracing::{error, info, warn};

use super::{sign_up_error, AccountInput, ProvisionedAccount};
use crate::error::{AppError, AppResult};
use crate::identity::AdminIdentityService;
use crate::store::ProfileStore;

/// Server-side provisioning with the service-role credential.
///
/// No operator session lives in this process, so there is nothing to preserve; in
/// exchange, an account whose profile cannot be written is deleted again.
pub struct AdminProvisioner {
    identity: Arc<dyn AdminIdentityService>,
    profiles: Arc<dyn ProfileStore>,
}

impl AdminProvisioner {
    pub fn new(identity: Arc<dyn AdminIdentityService>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    pub fn identity(&self) -> &Arc<dyn AdminIdentityService> { &self.identity }

    pub async fn create_worker(&self, input: &AccountInput) -> AppResult<ProvisionedAccount> {
        let req = input.sign_up_request()?;
        let user = self.identity.create_user(&req).await.map_err(|e| sign_up_error(&req.email, e))?;
        info!(target: "provisioning", account = %user.id, handle = %req.email, "account created (admin)");

        let profile = input.profile_for(user.id);
        match self.profiles.insert_worker(&profile).await {
            Ok(stored) => Ok(ProvisionedAccount {
                account_id: user.id,
                email: req.email,
                profile: stored,
                client: None,
                session_restored: true,
            }),
            Err(e) => {
                let account = user.id.to_string();
                warn!(target: "provisioning", %account, error = %e, "profile insert failed; deleting account");
                let code = match self.identity.delete_user(&account).await {
                    Ok(()) => "profile_rolled_back",
                    Err(del) => {
                        error!(target: "provisioning", %account, error = %del, "rollback failed; account is orphaned");
                        "profile_orphaned"
                    }
                };
                Err(AppError::profile_creation(
                    code.to_string(),
                    format!("Error al crear el perfil: {}", e),
                    Some(account),
                ))
            }
        }
    }
}
