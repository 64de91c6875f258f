//! Environment-driven configuration shared by the server and CLI binaries.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::provisioning::ProvisioningStrategy;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub anon_key: String,
    /// Only the server needs it; never shipped to clients.
    pub service_role_key: Option<String>,
    pub http_port: u16,
    pub http_timeout: Duration,
    pub provisioning: ProvisioningStrategy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let backend_url = get("ELECTRIX_BACKEND_URL").ok_or_else(|| anyhow!("ELECTRIX_BACKEND_URL is not set"))?;
        let anon_key = get("ELECTRIX_ANON_KEY").unwrap_or_default();
        let service_role_key = get("ELECTRIX_SERVICE_ROLE_KEY");
        let http_port = match get("ELECTRIX_HTTP_PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("ELECTRIX_HTTP_PORT='{}'", v))?,
            None => DEFAULT_HTTP_PORT,
        };
        let timeout_secs = match get("ELECTRIX_HTTP_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().with_context(|| format!("ELECTRIX_HTTP_TIMEOUT_SECS='{}'", v))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        let provisioning = match get("ELECTRIX_PROVISIONING") {
            Some(v) => v.parse::<ProvisioningStrategy>().map_err(|e| anyhow!(e))?,
            None => ProvisioningStrategy::default(),
        };
        Ok(Self {
            backend_url,
            anon_key,
            service_role_key,
            http_port,
            http_timeout: Duration::from_secs(timeout_secs),
            provisioning,
        })
    }

    pub fn require_service_role_key(&self) -> Result<&str> {
        self.service_role_key
            .as_deref()
            .ok_or_else(|| anyhow!("ELECTRIX_SERVICE_ROLE_KEY is required for privileged provisioning"))
    }
}
