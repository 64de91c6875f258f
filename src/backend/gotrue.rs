use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{base_url, error_from, BackendError};
use crate::identity::{AdminIdentityService, AuthUser, IdentityService, Session, SessionStore, SignUpRequest};

/// Token response of the auth API.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Self {
        Session {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at: t.expires_at.and_then(|s| Utc.timestamp_opt(s, 0).single()),
            user: t.user,
        }
    }
}

/// Anon-key client. Sessions it obtains land in its `SessionStore`.
#[derive(Clone)]
pub struct GoTrueClient {
    base: Url,
    api_key: String,
    http: reqwest::Client,
    sessions: SessionStore,
}

impl GoTrueClient {
    pub fn new(backend_url: &str, api_key: &str, http: reqwest::Client, sessions: SessionStore) -> Result<Self> {
        Ok(Self { base: base_url(backend_url)?, api_key: api_key.to_string(), http, sessions })
    }

    pub fn sessions(&self) -> &SessionStore { &self.sessions }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base.join(path).map_err(|e| BackendError::Transport(e.to_string()))
    }
}

#[async_trait]
impl IdentityService for GoTrueClient {
    async fn sign_up(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError> {
        let resp = self
            .http
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&json!({"email": req.email, "password": req.password, "data": req.metadata}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let body: Value = resp.json().await?;
        // Auto-confirming backends answer with a session; others with the bare user.
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
            let session = Session::from(token);
            let user = session.user.clone();
            self.sessions.set(session);
            return Ok(user);
        }
        let user_value = body.get("user").cloned().unwrap_or(body);
        serde_json::from_value(user_value).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn sign_in_with_password(&self, handle: &str, password: &str) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({"email": handle, "password": password}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let session = Session::from(resp.json::<TokenResponse>().await?);
        self.sessions.set(session.clone());
        Ok(session)
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let resp = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp.json::<AuthUser>().await?)
    }

    fn get_session(&self) -> Option<Session> { self.sessions.get() }

    async fn set_session(&self, session: Session) -> Result<(), BackendError> {
        // The token must still be accepted before it becomes the ambient session.
        let user = self.get_user(&session.access_token).await?;
        debug!(target: "auth", user = %user.id, "session verified");
        self.sessions.set(session);
        Ok(())
    }

    fn sign_out(&self) {
        self.sessions.clear();
    }

    fn detached(&self) -> Option<Arc<dyn IdentityService>> {
        let mut temp = self.clone();
        temp.sessions = SessionStore::ephemeral();
        Some(Arc::new(temp))
    }
}

/// Service-role client for the auth admin API.
#[derive(Clone)]
pub struct GoTrueAdmin {
    base: Url,
    service_key: String,
    http: reqwest::Client,
}

impl GoTrueAdmin {
    pub fn new(backend_url: &str, service_key: &str, http: reqwest::Client) -> Result<Self> {
        Ok(Self { base: base_url(backend_url)?, service_key: service_key.to_string(), http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base.join(path).map_err(|e| BackendError::Transport(e.to_string()))
    }
}

#[async_trait]
impl AdminIdentityService for GoTrueAdmin {
    async fn create_user(&self, req: &SignUpRequest) -> Result<AuthUser, BackendError> {
        let resp = self
            .http
            .post(self.endpoint("auth/v1/admin/users")?)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({
                "email": req.email,
                "password": req.password,
                "email_confirm": true,
                "user_metadata": req.metadata,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp.json::<AuthUser>().await?)
    }

    async fn delete_user(&self, id: &str) -> Result<(), BackendError> {
        let resp = self
            .http
            .delete(self.endpoint(&format!("auth/v1/admin/users/{}", id))?)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let resp = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp.json::<AuthUser>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> GoTrueClient {
        let http = crate::backend::http_client(Duration::from_secs(1)).unwrap();
        GoTrueClient::new("https://demo.example.co", "anon", http, SessionStore::persistent()).unwrap()
    }

    #[test]
    fn token_response_converts_expiry() {
        let body = serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 1_800_000_000i64,
            "token_type": "bearer",
            "user": {"id": uuid::Uuid::nil(), "email": "123456785@electrix.cl", "user_metadata": {"rol": "admin"}}
        });
        let s = Session::from(serde_json::from_value::<TokenResponse>(body).unwrap());
        assert_eq!(s.expires_at.unwrap().timestamp(), 1_800_000_000);
        assert_eq!(s.user.metadata.role, Some(crate::identity::Role::Admin));
        assert_eq!(s.user.login_name(), Some("123456785"));
    }

    #[test]
    fn detached_client_has_its_own_store() {
        let c = client();
        let d = c.detached().unwrap();
        assert!(d.get_session().is_none());
        c.sessions().set(Session {
            access_token: "operator".into(),
            refresh_token: None,
            expires_at: None,
            user: AuthUser { id: uuid::Uuid::nil(), email: None, metadata: Default::default() },
        });
        assert!(d.get_session().is_none());
        assert!(c.get_session().is_some());
    }
}
