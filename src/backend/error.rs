use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

/// Error codes the auth API uses for a duplicate sign-up.
const ALREADY_REGISTERED_CODES: &[&str] = &["user_already_exists", "email_exists"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{message}")]
    Api { status: u16, code: Option<String>, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        BackendError::Api { status, code: code.map(str::to_string), message: message.into() }
    }

    /// Build from an error response body. The auth API and the row API disagree on
    /// field names, so every known spelling is tried.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let field = |names: &[&str]| -> Option<String> {
            let v = parsed.as_ref()?;
            names.iter().find_map(|n| v.get(*n).and_then(|x| x.as_str()).map(str::to_string))
        };
        let code = field(&["error_code", "error", "code"]);
        let message = field(&["msg", "message", "error_description", "error"])
            .unwrap_or_else(|| if body.trim().is_empty() { format!("HTTP {}", status) } else { body.trim().to_string() });
        BackendError::Api { status, code, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Duplicate-account detection: structured code first, message text as a last resort.
    pub fn is_already_registered(&self) -> bool {
        let BackendError::Api { code, message, .. } = self else { return false; };
        if let Some(c) = code {
            if ALREADY_REGISTERED_CODES.iter().any(|k| c.eq_ignore_ascii_case(k)) {
                return true;
            }
        }
        message.to_ascii_lowercase().contains("already registered")
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(400) | Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        let code = match &err {
            BackendError::Api { code: Some(c), .. } => c.clone(),
            BackendError::Api { .. } => "backend_error".to_string(),
            BackendError::Transport(_) => "backend_unreachable".to_string(),
            BackendError::Decode(_) => "backend_decode".to_string(),
        };
        AppError::Backend { code, message: err.to_string() }
    }
}
