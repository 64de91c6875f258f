//! HTTP adapters for the hosted backend: the GoTrue-compatible auth API and the
//! PostgREST-compatible row API.

mod error;
mod gotrue;
mod rest;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

pub use error::BackendError;
pub use gotrue::{GoTrueAdmin, GoTrueClient};
pub use rest::{RestProfileStore, RowAuth};

/// Shared reqwest client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// Parse the backend base URL, normalizing to a trailing slash so `join` appends.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let mut s = raw.trim().to_string();
    if !s.ends_with('/') { s.push('/'); }
    Url::parse(&s).with_context(|| format!("invalid backend URL: {}", raw))
}

/// Turn a non-success response into a `BackendError`.
pub(crate) async fn error_from(resp: reqwest::Response) -> BackendError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    BackendError::from_body(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let u = base_url("https://demo.example.co").unwrap();
        assert_eq!(u.join("auth/v1/signup").unwrap().as_str(), "https://demo.example.co/auth/v1/signup");
        let u = base_url("https://demo.example.co/proxy").unwrap();
        assert_eq!(u.join("rest/v1/clientes").unwrap().as_str(), "https://demo.example.co/proxy/rest/v1/clientes");
        assert!(base_url("not a url").is_err());
    }
}
