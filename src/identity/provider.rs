use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::authorizer::Capabilities;
use super::principal::{AuthUser, UserMetadata};
use super::profile::{resolve_profile, Profile};
use super::session::Session;
use crate::backend::BackendError;
use crate::error::{AppError, AppResult};
use crate::rut;
use crate::store::ProfileStore;

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub metadata: UserMetadata,
}

/// Client-side view of the hosted identity service.
///
/// Implementations keep the session they obtain on sign-in (and on sign-up when the
/// backend auto-confirms) in their own session store, which is how a sign-up through
/// the ambient client replaces the operator's session.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_up(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError>;
    async fn sign_in_with_password(&self, handle: &str, password: &str) -> Result<Session, BackendError>;
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;
    fn get_session(&self) -> Option<Session>;
    /// Reinstate a session; the backend may reject a revoked or expired token.
    async fn set_session(&self, session: Session) -> Result<(), BackendError>;
    fn sign_out(&self);
    /// An independent client over the same backend whose session never touches this
    /// client's store. `None` when the backend cannot isolate sessions.
    fn detached(&self) -> Option<Arc<dyn IdentityService>> { None }
}

/// Service-role access to the identity service; only ever held server-side.
#[async_trait]
pub trait AdminIdentityService: Send + Sync {
    /// Create an account with the address already confirmed.
    async fn create_user(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError>;
    async fn delete_user(&self, id: &str) -> Result<(), BackendError>;
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub profile: Option<Profile>,
    pub capabilities: Capabilities,
}

/// Password login with a RUT, client id or address as the identifier.
pub async fn login(
    identity: &dyn IdentityService,
    profiles: &dyn ProfileStore,
    identifier: &str,
    password: &str,
) -> AppResult<LoginOutcome> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::validation("identifier_required", "Por favor ingresa tu RUT o Email."));
    }
    if password.is_empty() {
        return Err(AppError::validation("password_required", "Por favor ingresa tu contraseña."));
    }
    let handle = rut::login_handle(identifier);
    let session = identity
        .sign_in_with_password(&handle, password)
        .await
        .map_err(|e| {
            if e.is_unauthorized() {
                AppError::auth("invalid_credentials", "Error al iniciar sesión. Verifica tu RUT y contraseña.")
            } else {
                AppError::from(e)
            }
        })?;
    info!(target: "auth", user = %session.user.id, "auth.login");

    let profile = match resolve_profile(profiles, &session.user).await {
        Ok(p) => p,
        Err(e) => {
            warn!(target: "auth", user = %session.user.id, error = %e, "profile lookup failed after login");
            None
        }
    };
    let capabilities = Capabilities::for_profile(profile.as_ref());
    Ok(LoginOutcome { session, profile, capabilities })
}
