use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::profile::Profile;

/// Specialty that grants supervisor rights to a worker without the supervisor role.
const SUPERVISOR_SPECIALTY: &str = "Supervisor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    #[default]
    Trabajador,
    Cliente,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Trabajador => "trabajador",
            Role::Cliente => "cliente",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "supervisor" => Ok(Role::Supervisor),
            "trabajador" | "worker" => Ok(Role::Trabajador),
            "cliente" | "client" => Ok(Role::Cliente),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// What the signed-in account may see and do, derived from its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub role: Role,
    pub is_admin: bool,
    pub is_supervisor: bool,
    pub is_worker: bool,
    pub is_client: bool,
    /// Income rows of the cash flow are restricted to admins and supervisors.
    pub can_view_income: bool,
}

impl Capabilities {
    pub fn for_profile(profile: Option<&Profile>) -> Self {
        let role = profile.map(Profile::role).unwrap_or_default();
        let specialty_supervisor = matches!(
            profile,
            Some(Profile::Worker(w)) if w.specialty.as_deref() == Some(SUPERVISOR_SPECIALTY)
        );
        let is_admin = role == Role::Admin;
        let is_supervisor = is_admin || role == Role::Supervisor || specialty_supervisor;
        Capabilities {
            role,
            is_admin,
            is_supervisor,
            is_worker: role == Role::Trabajador,
            is_client: role == Role::Cliente,
            can_view_income: is_supervisor,
        }
    }
}
