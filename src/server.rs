//!
//! electrix provisioning endpoint
//! ------------------------------
//! Axum server exposing the privileged worker-creation function. Operators call it
//! from the dashboard with their own bearer token; the server creates the account with
//! the service-role credential, so no browser session is ever replaced.
//!
//! Routes:
//! - `GET /` liveness.
//! - `OPTIONS /functions/create-worker` CORS preflight.
//! - `POST /functions/create-worker` create account + worker profile.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::backend::{http_client, GoTrueAdmin, RestProfileStore, RowAuth};
use crate::config::Config;
use crate::error::AppError;
use crate::provisioning::{AccountInput, AdminProvisioner, MIN_PASSWORD_LEN};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<AdminProvisioner>,
}

fn cors_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    h.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
    );
    h.insert("Access-Control-Allow-Methods", HeaderValue::from_static("POST, OPTIONS"));
    h
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer "))?.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn error_response(err: &AppError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut body = json!({"error": err.message(), "code": err.code_str()});
    if let Some(id) = err.account_id() {
        body["account_id"] = json!(id);
    }
    (status, cors_headers(), Json(body))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "electrix ok" }))
        .route("/functions/create-worker", post(create_worker).options(preflight))
        .with_state(state)
}

async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, cors_headers(), "ok")
}

pub async fn create_worker(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return error_response(&AppError::auth("missing_authorization", "Falta el encabezado de autorización"));
    };
    let caller = match state.provisioner.identity().get_user(token).await {
        Ok(user) => user,
        Err(e) => {
            warn!(target: "server", error = %e, "rejected create-worker: bearer not accepted");
            return error_response(&AppError::auth("unauthorized", "No autorizado"));
        }
    };
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rej) => return error_response(&AppError::validation("invalid_body".to_string(), rej.body_text())),
    };
    if input.display_name.trim().is_empty() || input.identity_number.trim().is_empty() || input.password.is_empty() {
        return error_response(&AppError::validation("missing_fields", "Faltan campos requeridos"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return error_response(&AppError::validation("weak_password", "La contraseña debe tener al menos 6 caracteres"));
    }

    info!(target: "server", caller = %caller.id, rut = %input.identity_number, "create-worker requested");
    match state.provisioner.create_worker(&input).await {
        Ok(account) => (
            StatusCode::OK,
            cors_headers(),
            Json(json!({
                "success": true,
                "user": {
                    "id": account.account_id,
                    "email": account.email,
                    "nombre": account.profile.display_name,
                    "rut": account.profile.identity_number,
                    "rol": account.profile.role,
                }
            })),
        ),
        Err(e) => {
            error!(target: "server", caller = %caller.id, error = %e, "create-worker failed");
            error_response(&e)
        }
    }
}

/// Build the service-role adapters from `config` and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let service_key = config.require_service_role_key()?;
    let http = http_client(config.http_timeout)?;
    let admin = GoTrueAdmin::new(&config.backend_url, service_key, http.clone())?;
    let profiles = RestProfileStore::new(&config.backend_url, service_key, http, RowAuth::ServiceKey)?;
    let state = AppState { provisioner: Arc::new(AdminProvisioner::new(Arc::new(admin), Arc::new(profiles))) };

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(target: "server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing() {
        let mut h = HeaderMap::new();
        assert_eq!(bearer_token(&h), None);
        h.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&h), Some("abc"));
        h.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&h), None);
        h.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&h), None);
    }

    #[test]
    fn error_body_carries_code_and_account() {
        let (status, headers, Json(body)) =
            error_response(&AppError::profile_creation("profile_rolled_back", "Error al crear el perfil: x", Some("u1".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "profile_rolled_back");
        assert_eq!(body["account_id"], "u1");
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
    }
}
