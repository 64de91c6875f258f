use anyhow::Result;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use super::{base_url, error_from, BackendError};
use crate::identity::SessionStore;
use crate::model::{Client, Worker};
use crate::store::ProfileStore;

const WORKERS: &str = "trabajadores";
const CLIENTS: &str = "clientes";

/// Which credential row requests carry.
#[derive(Debug, Clone)]
pub enum RowAuth {
    /// The ambient session's token, or the anon key while signed out.
    Session(SessionStore),
    /// Service-role key; bypasses row-level security.
    ServiceKey,
}

#[derive(Clone)]
pub struct RestProfileStore {
    base: Url,
    api_key: String,
    http: reqwest::Client,
    auth: RowAuth,
}

impl RestProfileStore {
    pub fn new(backend_url: &str, api_key: &str, http: reqwest::Client, auth: RowAuth) -> Result<Self> {
        Ok(Self { base: base_url(backend_url)?, api_key: api_key.to_string(), http, auth })
    }

    fn table(&self, name: &str) -> Result<Url, BackendError> {
        self.base.join(&format!("rest/v1/{}", name)).map_err(|e| BackendError::Transport(e.to_string()))
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        let token = match &self.auth {
            RowAuth::Session(store) => store.access_token().unwrap_or_else(|| self.api_key.clone()),
            RowAuth::ServiceKey => self.api_key.clone(),
        };
        rb.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn rows<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<Vec<T>, BackendError> {
        let resp = self.authorize(rb).send().await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp.json::<Vec<T>>().await?)
    }

    async fn first<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<Option<T>, BackendError> {
        Ok(self.rows(rb).await?.into_iter().next())
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn insert_worker(&self, worker: &Worker) -> Result<Worker, BackendError> {
        let rb = self
            .http
            .post(self.table(WORKERS)?)
            .header("Prefer", "return=representation")
            .json(&[worker]);
        self.first(rb).await?.ok_or_else(|| BackendError::Decode("insert returned no row".into()))
    }

    async fn find_worker_by_identity(&self, identity_number: &str) -> Result<Option<Worker>, BackendError> {
        let rb = self
            .http
            .get(self.table(WORKERS)?)
            .query(&[("select", "*".to_string()), ("rut", format!("eq.{}", identity_number)), ("limit", "1".to_string())]);
        self.first(rb).await
    }

    async fn find_client_by_account(&self, account_id: Uuid) -> Result<Option<Client>, BackendError> {
        let rb = self
            .http
            .get(self.table(CLIENTS)?)
            .query(&[("select", "*".to_string()), ("usuario_id", format!("eq.{}", account_id)), ("limit", "1".to_string())]);
        self.first(rb).await
    }

    async fn link_client_account(&self, client_id: Uuid, account_id: Uuid) -> Result<Client, BackendError> {
        let rb = self
            .http
            .patch(self.table(CLIENTS)?)
            .query(&[("id", format!("eq.{}", client_id))])
            .header("Prefer", "return=representation")
            .json(&json!({"usuario_id": account_id, "puede_ver_fotos": true}));
        self.first(rb)
            .await?
            .ok_or_else(|| BackendError::api(404, Some("client_not_found"), format!("cliente {} no existe", client_id)))
    }
}
