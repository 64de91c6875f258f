//! Profile record storage.
//! The hosted row API holds worker and client profiles; provisioning and login only
//! need this narrow slice of it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::BackendError;
use crate::model::{Client, Worker};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a worker-table profile and return the stored row.
    async fn insert_worker(&self, worker: &Worker) -> Result<Worker, BackendError>;
    async fn find_worker_by_identity(&self, identity_number: &str) -> Result<Option<Worker>, BackendError>;
    async fn find_client_by_account(&self, account_id: Uuid) -> Result<Option<Client>, BackendError>;
    /// Attach a portal account to a client and enable photo access.
    async fn link_client_account(&self, client_id: Uuid, account_id: Uuid) -> Result<Client, BackendError>;
}
