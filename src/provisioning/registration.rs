use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::AccountInput;
use crate::error::{AppError, AppResult};
use crate::rut;

/// Minimum password length accepted by the identity service.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Specialty preselected on the sign-up form.
pub const DEFAULT_SPECIALTY: &str = "Electricista";

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("phone regex"));

/// Self-registration form as typed by the worker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(alias = "nombre")]
    pub display_name: String,
    pub rut: String,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    /// Blank means `DEFAULT_SPECIALTY`.
    #[serde(default, alias = "especialidad")]
    pub specialty: Option<String>,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

impl From<&RegistrationForm> for AccountInput {
    fn from(form: &RegistrationForm) -> Self {
        let specialty = form
            .specialty
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SPECIALTY);
        AccountInput {
            display_name: form.display_name.trim().to_string(),
            identity_number: form.rut.trim().to_string(),
            email: None,
            password: form.password.clone(),
            role: None,
            specialty: Some(specialty.to_string()),
            phone: form.phone.clone(),
        }
    }
}

/// Field-level problems, in form order.
pub fn registration_errors(form: &RegistrationForm) -> Vec<(&'static str, &'static str)> {
    let mut errors = Vec::new();
    if form.display_name.trim().is_empty() {
        errors.push(("display_name", "El nombre es requerido"));
    }
    if form.rut.trim().is_empty() {
        errors.push(("rut", "El RUT es requerido"));
    } else if !rut::validate(&form.rut) {
        errors.push(("rut", "RUT inválido"));
    }
    if let Some(phone) = form.phone.as_deref().filter(|p| !p.is_empty()) {
        if !PHONE_RE.is_match(phone) {
            errors.push(("phone", "Teléfono inválido (ej: +56912345678)"));
        }
    }
    if form.password.is_empty() {
        errors.push(("password", "La contraseña es requerida"));
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(("password", "La contraseña debe tener al menos 6 caracteres"));
    }
    if form.password != form.confirm_password {
        errors.push(("confirm_password", "Las contraseñas no coinciden"));
    }
    errors
}

pub fn validate_registration(form: &RegistrationForm) -> AppResult<()> {
    let errors = registration_errors(form);
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors.iter().map(|(field, msg)| format!("{}: {}", field, msg)).collect::<Vec<_>>().join("; ");
    Err(AppError::Validation { code: "invalid_form".into(), message })
}
