//! In-memory stand-ins for the hosted backend shared by the integration tests.
//! The fake auth service mirrors the real one in the way that matters here: a
//! successful sign-up signs the calling client in as the new account.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use electrix::backend::BackendError;
use electrix::identity::{AdminIdentityService, AuthUser, IdentityService, Session, SessionStore, SignUpRequest};
use electrix::model::{Client, Worker};
use electrix::store::ProfileStore;

struct Account {
    user: AuthUser,
    password: String,
}

/// Accounts and call counters shared by every client of one fake backend.
#[derive(Default)]
pub struct FakeAuthBackend {
    accounts: Mutex<Vec<Account>>,
    /// Returned by the next sign-up instead of creating an account.
    pub sign_up_error: Mutex<Option<BackendError>>,
    pub reject_restore: AtomicBool,
    pub sign_ups: AtomicUsize,
    pub set_session_calls: AtomicUsize,
    pub sign_outs: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: AtomicBool,
}

impl FakeAuthBackend {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn token_for(id: Uuid) -> String { format!("tok-{}", id) }

    pub fn session_for(user: &AuthUser) -> Session {
        Session { access_token: Self::token_for(user.id), refresh_token: None, expires_at: None, user: user.clone() }
    }

    /// Register an account directly, bypassing any client session.
    pub fn seed(&self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser { id: Uuid::new_v4(), email: Some(email.to_string()), metadata: Default::default() };
        self.accounts.lock().push(Account { user: user.clone(), password: password.to_string() });
        user
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.lock().iter().any(|a| a.user.email.as_deref() == Some(email))
    }

    pub fn account_count(&self) -> usize { self.accounts.lock().len() }

    fn create(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError> {
        if let Some(err) = self.sign_up_error.lock().take() {
            return Err(err);
        }
        let mut accounts = self.accounts.lock();
        if accounts.iter().any(|a| a.user.email.as_deref() == Some(req.email.as_str())) {
            return Err(BackendError::api(422, Some("user_already_exists"), "User already registered"));
        }
        let user = AuthUser { id: Uuid::new_v4(), email: Some(req.email.clone()), metadata: req.metadata.clone() };
        accounts.push(Account { user: user.clone(), password: req.password.clone() });
        Ok(user)
    }

    fn user_for_token(&self, token: &str) -> Result<AuthUser, BackendError> {
        self.accounts
            .lock()
            .iter()
            .find(|a| Self::token_for(a.user.id) == token)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::api(401, Some("bad_jwt"), "invalid JWT"))
    }
}

pub struct FakeIdentity {
    pub backend: Arc<FakeAuthBackend>,
    pub sessions: SessionStore,
    isolatable: bool,
}

impl FakeIdentity {
    pub fn new(backend: Arc<FakeAuthBackend>) -> Self {
        Self { backend, sessions: SessionStore::persistent(), isolatable: true }
    }

    /// A client that cannot hand out detached instances.
    pub fn without_isolation(backend: Arc<FakeAuthBackend>) -> Self {
        Self { backend, sessions: SessionStore::persistent(), isolatable: false }
    }

    /// Seed an operator account and sign this client in as it.
    pub fn signed_in_as(&self, email: &str) -> Session {
        let user = self.backend.seed(email, "operator-pass");
        let session = FakeAuthBackend::session_for(&user);
        self.sessions.set(session.clone());
        session
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn sign_up(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError> {
        self.backend.sign_ups.fetch_add(1, Ordering::SeqCst);
        let user = self.backend.create(req)?;
        self.sessions.set(FakeAuthBackend::session_for(&user));
        Ok(user)
    }

    async fn sign_in_with_password(&self, handle: &str, password: &str) -> Result<Session, BackendError> {
        let user = self
            .backend
            .accounts
            .lock()
            .iter()
            .find(|a| a.user.email.as_deref() == Some(handle) && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::api(400, Some("invalid_credentials"), "Invalid login credentials"))?;
        let session = FakeAuthBackend::session_for(&user);
        self.sessions.set(session.clone());
        Ok(session)
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.backend.user_for_token(access_token)
    }

    fn get_session(&self) -> Option<Session> { self.sessions.get() }

    async fn set_session(&self, session: Session) -> Result<(), BackendError> {
        self.backend.set_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.backend.reject_restore.load(Ordering::SeqCst) {
            return Err(BackendError::api(401, Some("session_not_found"), "Session expired"));
        }
        self.sessions.set(session);
        Ok(())
    }

    fn sign_out(&self) {
        self.backend.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.sessions.clear();
    }

    fn detached(&self) -> Option<Arc<dyn IdentityService>> {
        if !self.isolatable {
            return None;
        }
        Some(Arc::new(FakeIdentity {
            backend: self.backend.clone(),
            sessions: SessionStore::ephemeral(),
            isolatable: true,
        }))
    }
}

pub struct FakeAdmin {
    pub backend: Arc<FakeAuthBackend>,
}

#[async_trait]
impl AdminIdentityService for FakeAdmin {
    async fn create_user(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError> {
        self.backend.sign_ups.fetch_add(1, Ordering::SeqCst);
        self.backend.create(req)
    }

    async fn delete_user(&self, id: &str) -> Result<(), BackendError> {
        if self.backend.fail_delete.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".into()));
        }
        self.backend.accounts.lock().retain(|a| a.user.id.to_string() != id);
        self.backend.deleted.lock().push(id.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.backend.user_for_token(access_token)
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    pub workers: Mutex<Vec<Worker>>,
    pub clients: Mutex<Vec<Client>>,
    pub fail_insert: AtomicBool,
    pub fail_link: AtomicBool,
    pub fail_lookup: AtomicBool,
    pub inserts: AtomicUsize,
}

impl FakeProfiles {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn add_client(&self, name: &str) -> Client {
        let c = Client {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            kind: Some("constructora".into()),
            account_id: None,
            can_view_photos: false,
            created_at: None,
        };
        self.clients.lock().push(c.clone());
        c
    }

    fn check_lookup(&self) -> Result<(), BackendError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(BackendError::api(500, None, "lookup failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn insert_worker(&self, worker: &Worker) -> Result<Worker, BackendError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(BackendError::api(403, Some("42501"), "new row violates row-level security policy"));
        }
        let mut stored = worker.clone();
        stored.created_at = Some(chrono::Utc::now());
        self.workers.lock().push(stored.clone());
        Ok(stored)
    }

    async fn find_worker_by_identity(&self, identity_number: &str) -> Result<Option<Worker>, BackendError> {
        self.check_lookup()?;
        Ok(self.workers.lock().iter().find(|w| w.identity_number == identity_number).cloned())
    }

    async fn find_client_by_account(&self, account_id: Uuid) -> Result<Option<Client>, BackendError> {
        self.check_lookup()?;
        Ok(self.clients.lock().iter().find(|c| c.account_id == Some(account_id)).cloned())
    }

    async fn link_client_account(&self, client_id: Uuid, account_id: Uuid) -> Result<Client, BackendError> {
        if self.fail_link.load(Ordering::SeqCst) {
            return Err(BackendError::api(500, None, "update failed"));
        }
        let mut clients = self.clients.lock();
        let c = clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .ok_or_else(|| BackendError::api(404, Some("client_not_found"), "no such client"))?;
        c.account_id = Some(account_id);
        c.can_view_photos = true;
        Ok(c.clone())
    }
}
