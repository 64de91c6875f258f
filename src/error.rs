//! Unified application error model and mapping helpers.
//! Every fallible operation in the crate (RUT parsing, login, provisioning, the HTTP
//! surface) reports through `AppError`, so callers can branch on the variant and show
//! the human-readable message.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed input caught before any network call.
    Validation { code: String, message: String },
    /// The identity service already holds an account for this login handle.
    AlreadyRegistered { code: String, message: String },
    /// Any other identity-service failure while creating the account.
    AccountCreation { code: String, message: String },
    /// The account exists but its profile record could not be written.
    ProfileCreation { code: String, message: String, account_id: Option<String> },
    /// The operator session could not be put back; the caller must re-authenticate.
    SessionRestore { code: String, message: String },
    Auth { code: String, message: String },
    Backend { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::AlreadyRegistered { code, .. }
            | AppError::AccountCreation { code, .. }
            | AppError::ProfileCreation { code, .. }
            | AppError::SessionRestore { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Backend { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::AlreadyRegistered { message, .. }
            | AppError::AccountCreation { message, .. }
            | AppError::ProfileCreation { message, .. }
            | AppError::SessionRestore { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Backend { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    /// Id of the account left behind by a failed profile write, if any.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            AppError::ProfileCreation { account_id, .. } => account_id.as_deref(),
            _ => None,
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn already_registered<S: Into<String>>(code: S, msg: S) -> Self { AppError::AlreadyRegistered { code: code.into(), message: msg.into() } }
    pub fn account_creation<S: Into<String>>(code: S, msg: S) -> Self { AppError::AccountCreation { code: code.into(), message: msg.into() } }
    pub fn profile_creation<S: Into<String>>(code: S, msg: S, account_id: Option<String>) -> Self {
        AppError::ProfileCreation { code: code.into(), message: msg.into(), account_id }
    }
    pub fn session_restore<S: Into<String>>(code: S, msg: S) -> Self { AppError::SessionRestore { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn backend<S: Into<String>>(code: S, msg: S) -> Self { AppError::Backend { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::AlreadyRegistered { .. } => 409,
            AppError::AccountCreation { .. } => 502,
            AppError::ProfileCreation { .. } => 500,
            AppError::SessionRestore { .. } => 503,
            AppError::Auth { .. } => 401,
            AppError::Backend { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::validation("invalid_rut", "RUT inválido").http_status(), 400);
        assert_eq!(AppError::already_registered("already_registered", "dup").http_status(), 409);
        assert_eq!(AppError::account_creation("signup_failed", "x").http_status(), 502);
        assert_eq!(AppError::profile_creation("profile_failed", "x", None).http_status(), 500);
        assert_eq!(AppError::session_restore("restore_failed", "x").http_status(), 503);
        assert_eq!(AppError::auth("invalid_credentials", "no").http_status(), 401);
        assert_eq!(AppError::backend("transport", "down").http_status(), 502);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn profile_error_carries_account_id() {
        let e = AppError::profile_creation("profile_failed", "insert rejected", Some("abc".into()));
        assert_eq!(e.account_id(), Some("abc"));
        assert_eq!(AppError::auth("a", "b").account_id(), None);
        assert_eq!(e.to_string(), "profile_failed: insert rejected");
    }

    #[test]
    fn serializes_with_type_tag() {
        let v = serde_json::to_value(AppError::validation("invalid_rut", "bad")).unwrap();
        assert_eq!(v["type"], "validation");
        assert_eq!(v["code"], "invalid_rut");
    }
}
