//! Account provisioning
//! --------------------
//! Creates an auth account plus its profile record on behalf of an operator who is
//! already signed in. The identity service signs in as whichever account was created
//! last within a client, so a naive sign-up logs the operator out. Two strategies
//! keep the operator's session alive:
//!
//! - `Isolated`: sign up through a detached client with an ephemeral session store.
//!   The ambient session is never touched.
//! - `CaptureAndRestore`: sign up through the ambient client, then put the captured
//!   operator session back. A crash in between logs the operator out.
//!
//! Either way the operator's session is active when `create_account` returns,
//! whenever one existed beforehand.

mod privileged;
mod registration;

use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::BackendError;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthUser, IdentityService, Role, Session, SignUpRequest, UserMetadata};
use crate::model::{Client, Worker};
use crate::rut;
use crate::store::ProfileStore;

pub use privileged::AdminProvisioner;
pub use registration::{registration_errors, validate_registration, RegistrationForm, DEFAULT_SPECIALTY, MIN_PASSWORD_LEN};

/// Specialty recorded on the public profile of client portal accounts.
const CLIENT_SPECIALTY: &str = "Cliente";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

pub(crate) fn is_email(s: &str) -> bool { EMAIL_RE.is_match(s) }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStrategy {
    #[default]
    Isolated,
    CaptureAndRestore,
}

impl FromStr for ProvisioningStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "isolated" => Ok(ProvisioningStrategy::Isolated),
            "capture_restore" | "capture_and_restore" => Ok(ProvisioningStrategy::CaptureAndRestore),
            other => Err(format!("unknown provisioning strategy '{}'", other)),
        }
    }
}

/// New worker (or admin/supervisor) account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInput {
    #[serde(alias = "nombre")]
    pub display_name: String,
    #[serde(alias = "rut")]
    pub identity_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default, alias = "rol")]
    pub role: Option<Role>,
    #[serde(default, alias = "especialidad")]
    pub specialty: Option<String>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
}

impl AccountInput {
    /// The explicit address when one with an `@` was given, else `{canonical}@electrix.cl`.
    pub fn login_handle(&self) -> AppResult<String> {
        let explicit = self.email.as_deref().map(str::trim).filter(|e| e.contains('@'));
        let handle = match explicit {
            Some(e) => e.to_string(),
            None => {
                let canonical = rut::clean(self.identity_number.trim());
                if canonical.is_empty() {
                    return Err(AppError::validation("identity_required", "El RUT es requerido"));
                }
                format!("{}@{}", canonical, rut::LOGIN_DOMAIN)
            }
        };
        if !is_email(&handle) {
            return Err(AppError::validation("invalid_login_handle", "Correo o RUT inválido"));
        }
        Ok(handle)
    }

    pub fn canonical_identity(&self) -> String { rut::clean(self.identity_number.trim()) }

    fn sign_up_request(&self) -> AppResult<SignUpRequest> {
        Ok(SignUpRequest {
            email: self.login_handle()?,
            password: self.password.clone(),
            metadata: UserMetadata {
                display_name: Some(self.display_name.clone()),
                identity_number: Some(self.canonical_identity()),
                role: Some(self.role.unwrap_or_default()),
                client_id: None,
            },
        })
    }

    fn profile_for(&self, account_id: Uuid) -> Worker {
        Worker {
            id: account_id,
            display_name: self.display_name.clone(),
            identity_number: self.canonical_identity(),
            role: self.role.unwrap_or_default(),
            specialty: self.specialty.clone(),
            phone: self.phone.clone().filter(|p| !p.trim().is_empty()),
            active: true,
            created_at: None,
        }
    }
}

/// Portal account for an existing client record.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientAccountInput {
    /// Address, RUT, or a bare client id such as `2121`.
    pub login: String,
    pub password: String,
    pub client_id: Uuid,
}

impl ClientAccountInput {
    pub fn login_handle(&self) -> AppResult<String> {
        let handle = rut::login_handle(self.login.trim());
        if !is_email(&handle) {
            return Err(AppError::validation("invalid_login_handle", "Correo o identificador inválido"));
        }
        Ok(handle)
    }
}

/// Profile name for a client handle: the local part of generated handles, the whole
/// address otherwise.
fn client_profile_name(handle: &str) -> String {
    let suffix = format!("@{}", rut::LOGIN_DOMAIN);
    match handle.strip_suffix(&suffix) {
        Some(local) => local.to_string(),
        None => handle.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedAccount {
    pub account_id: Uuid,
    pub email: String,
    pub profile: Worker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    /// False when the operator session could not be put back and the caller must
    /// re-authenticate.
    pub session_restored: bool,
}

/// Profile writes that follow a successful sign-up.
enum ProfilePlan {
    Worker(Worker),
    ClientPortal { profile: Worker, client_id: Uuid },
}

impl ProfilePlan {
    fn with_account(self, id: Uuid) -> Self {
        match self {
            ProfilePlan::Worker(mut w) => { w.id = id; ProfilePlan::Worker(w) }
            ProfilePlan::ClientPortal { mut profile, client_id } => {
                profile.id = id;
                ProfilePlan::ClientPortal { profile, client_id }
            }
        }
    }
}

/// What has to happen to the ambient session once the account exists.
enum Captured {
    /// Sign-up ran on a detached client; nothing to undo.
    Isolated,
    /// Sign-up ran on the ambient client; reinstate this (or sign out when `None`).
    Ambient(Option<Session>),
}

pub struct Provisioner {
    identity: Arc<dyn IdentityService>,
    profiles: Arc<dyn ProfileStore>,
    strategy: ProvisioningStrategy,
}

impl Provisioner {
    pub fn new(identity: Arc<dyn IdentityService>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles, strategy: ProvisioningStrategy::default() }
    }

    pub fn with_strategy(mut self, strategy: ProvisioningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> ProvisioningStrategy { self.strategy }

    pub async fn create_account(&self, input: &AccountInput) -> AppResult<ProvisionedAccount> {
        let req = input.sign_up_request()?;
        let plan = ProfilePlan::Worker(input.profile_for(Uuid::nil()));
        self.provision(req, plan).await
    }

    /// Self-registration from the public sign-up form. The form is validated first,
    /// checksum included; the registrant is not left signed in.
    pub async fn register(&self, form: &RegistrationForm) -> AppResult<ProvisionedAccount> {
        validate_registration(form)?;
        let input = AccountInput::from(form);
        let req = input.sign_up_request()?;
        let plan = ProfilePlan::Worker(input.profile_for(Uuid::nil()));
        self.provision(req, plan).await.map_err(|e| match e {
            AppError::AlreadyRegistered { code, .. } => AppError::AlreadyRegistered {
                code,
                message: "Este RUT ya está registrado. Intenta iniciar sesión.".into(),
            },
            other => other,
        })
    }

    pub async fn create_client_account(&self, input: &ClientAccountInput) -> AppResult<ProvisionedAccount> {
        let handle = input.login_handle()?;
        let name = client_profile_name(&handle);
        let req = SignUpRequest {
            email: handle,
            password: input.password.clone(),
            metadata: UserMetadata {
                display_name: None,
                identity_number: None,
                role: Some(Role::Cliente),
                client_id: Some(input.client_id),
            },
        };
        let profile = Worker {
            id: Uuid::nil(),
            display_name: name.clone(),
            identity_number: name,
            role: Role::Cliente,
            specialty: Some(CLIENT_SPECIALTY.to_string()),
            phone: None,
            active: true,
            created_at: None,
        };
        self.provision(req, ProfilePlan::ClientPortal { profile, client_id: input.client_id }).await
    }

    async fn provision(&self, req: SignUpRequest, plan: ProfilePlan) -> AppResult<ProvisionedAccount> {
        let (client, captured) = self.capture();

        let user = client.sign_up(&req).await.map_err(|e| sign_up_error(&req.email, e))?;
        info!(target: "provisioning", account = %user.id, handle = %req.email, "account created");

        let written = self.write_profile(&user, plan.with_account(user.id)).await;
        let session_restored = self.restore(captured).await;

        match written {
            Ok((profile, client)) => {
                info!(target: "provisioning", account = %user.id, session_restored, "profile created");
                Ok(ProvisionedAccount {
                    account_id: user.id,
                    email: req.email,
                    profile,
                    client,
                    session_restored,
                })
            }
            Err(e) => {
                warn!(
                    target: "provisioning",
                    account = %user.id,
                    error = %e,
                    "account created without profile; left for manual cleanup"
                );
                Err(AppError::profile_creation(
                    "profile_creation_failed".to_string(),
                    format!("Usuario creado pero falló el perfil: {}", e),
                    Some(user.id.to_string()),
                ))
            }
        }
    }

    fn capture(&self) -> (Arc<dyn IdentityService>, Captured) {
        if self.strategy == ProvisioningStrategy::Isolated {
            if let Some(detached) = self.identity.detached() {
                debug!(target: "provisioning", "signing up through a detached identity client");
                return (detached, Captured::Isolated);
            }
            warn!(target: "provisioning", "identity service cannot isolate sessions; falling back to capture-and-restore");
        }
        let held = self.identity.get_session();
        debug!(target: "provisioning", operator = ?held.as_ref().map(|s| s.user.id), "captured ambient session");
        (self.identity.clone(), Captured::Ambient(held))
    }

    async fn write_profile(&self, user: &AuthUser, plan: ProfilePlan) -> Result<(Worker, Option<Client>), BackendError> {
        match plan {
            ProfilePlan::Worker(w) => Ok((self.profiles.insert_worker(&w).await?, None)),
            ProfilePlan::ClientPortal { profile, client_id } => {
                let stored = self.profiles.insert_worker(&profile).await?;
                let client = self.profiles.link_client_account(client_id, user.id).await?;
                Ok((stored, Some(client)))
            }
        }
    }

    /// Best effort: failures are logged and reported through the return value only.
    async fn restore(&self, captured: Captured) -> bool {
        match captured {
            Captured::Isolated => true,
            Captured::Ambient(Some(session)) => {
                let operator = session.user.id;
                match self.identity.set_session(session).await {
                    Ok(()) => {
                        debug!(target: "provisioning", %operator, "operator session restored");
                        true
                    }
                    Err(e) => {
                        let err = AppError::session_restore("session_restore_failed".to_string(), e.to_string());
                        warn!(target: "provisioning", %operator, error = %err, "operator must re-authenticate");
                        false
                    }
                }
            }
            Captured::Ambient(None) => {
                self.identity.sign_out();
                true
            }
        }
    }
}

fn sign_up_error(handle: &str, err: BackendError) -> AppError {
    if err.is_already_registered() {
        info!(target: "provisioning", %handle, "sign-up rejected: already registered");
        return AppError::already_registered(
            "already_registered".to_string(),
            format!("{} ya está registrado. Intenta iniciar sesión.", handle),
        );
    }
    warn!(target: "provisioning", %handle, error = %err, "sign-up failed");
    AppError::account_creation(err.code().unwrap_or("sign_up_failed").to_string(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(identity: &str, email: Option<&str>) -> AccountInput {
        AccountInput {
            display_name: "Test".into(),
            identity_number: identity.into(),
            email: email.map(str::to_string),
            password: "abcdef".into(),
            ..Default::default()
        }
    }

    #[test]
    fn handle_derived_from_identity() {
        assert_eq!(input("11.111.111-1", None).login_handle().unwrap(), "111111111@electrix.cl");
        assert_eq!(input("11111111", Some("")).login_handle().unwrap(), "11111111@electrix.cl");
        // no '@': treated as absent
        assert_eq!(input("11111111", Some("pedro")).login_handle().unwrap(), "11111111@electrix.cl");
    }

    #[test]
    fn explicit_address_wins_when_well_formed() {
        assert_eq!(input("1", Some(" ana@correo.cl ")).login_handle().unwrap(), "ana@correo.cl");
        let err = input("1", Some("ana@")).login_handle().unwrap_err();
        assert_eq!(err.code_str(), "invalid_login_handle");
    }

    #[test]
    fn empty_identity_rejected_before_network() {
        let err = input(" .- ", None).login_handle().unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        let err = input("11 11", None).login_handle().unwrap_err();
        assert_eq!(err.code_str(), "invalid_login_handle");
    }

    #[test]
    fn sign_up_metadata_and_profile() {
        let mut i = input("12.345.678-5", None);
        i.phone = Some("  ".into());
        let req = i.sign_up_request().unwrap();
        assert_eq!(req.metadata.identity_number.as_deref(), Some("123456785"));
        assert_eq!(req.metadata.role, Some(Role::Trabajador));
        let id = Uuid::new_v4();
        let w = i.profile_for(id);
        assert_eq!(w.id, id);
        assert!(w.active);
        assert_eq!(w.phone, None);
    }

    #[test]
    fn client_profile_names() {
        assert_eq!(client_profile_name("2121@electrix.cl"), "2121");
        assert_eq!(client_profile_name("obra@constructora.cl"), "obra@constructora.cl");
        let ci = ClientAccountInput { login: "21.21".into(), password: "abcdef".into(), client_id: Uuid::nil() };
        assert_eq!(ci.login_handle().unwrap(), "2121@electrix.cl");
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("isolated".parse::<ProvisioningStrategy>().unwrap(), ProvisioningStrategy::Isolated);
        assert_eq!("capture-restore".parse::<ProvisioningStrategy>().unwrap(), ProvisioningStrategy::CaptureAndRestore);
        assert!("other".parse::<ProvisioningStrategy>().is_err());
    }

    #[test]
    fn sign_up_errors_are_classified() {
        let dup = sign_up_error("x@electrix.cl", BackendError::api(422, Some("user_already_exists"), "User already registered"));
        assert!(matches!(dup, AppError::AlreadyRegistered { .. }));
        let other = sign_up_error("x@electrix.cl", BackendError::api(429, Some("over_email_send_rate_limit"), "slow down"));
        assert!(matches!(other, AppError::AccountCreation { .. }));
        assert_eq!(other.code_str(), "over_email_send_rate_limit");
    }
}
