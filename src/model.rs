//! Typed records for the rows the dashboard reads from the hosted backend.
//! Field names on the wire are the backend's column names.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{Capabilities, Role};

fn default_true() -> bool { true }

/// Worker-table row. Client portal accounts also get one, as their public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub display_name: String,
    /// Canonical RUT (or the client login id for portal accounts).
    #[serde(rename = "rut")]
    pub identity_number: String,
    #[serde(rename = "rol", default)]
    pub role: Role,
    #[serde(rename = "especialidad", default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub display_name: String,
    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "usuario_id", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(rename = "puede_ver_fotos", default)]
    pub can_view_photos: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub display_name: String,
    #[serde(rename = "cliente_id")]
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Installation stages tracked per housing unit, in the order crews complete them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitChecklist {
    #[serde(default)]
    pub factibilidad: bool,
    #[serde(default)]
    pub te1: bool,
    #[serde(default)]
    pub empalme: bool,
    #[serde(default)]
    pub tda: bool,
    #[serde(default)]
    pub canalizacion: bool,
    #[serde(default)]
    pub cableado: bool,
    #[serde(default)]
    pub bomba_agua: bool,
    #[serde(default)]
    pub soldadura: bool,
    #[serde(default)]
    pub artefactado: bool,
    #[serde(default)]
    pub pruebas_electricas: bool,
    #[serde(default)]
    pub rotulado: bool,
}

impl UnitChecklist {
    pub fn stages(&self) -> [(&'static str, bool); 11] {
        [
            ("factibilidad", self.factibilidad),
            ("te1", self.te1),
            ("empalme", self.empalme),
            ("tda", self.tda),
            ("canalizacion", self.canalizacion),
            ("cableado", self.cableado),
            ("bomba_agua", self.bomba_agua),
            ("soldadura", self.soldadura),
            ("artefactado", self.artefactado),
            ("pruebas_electricas", self.pruebas_electricas),
            ("rotulado", self.rotulado),
        ]
    }

    pub fn total(&self) -> usize { self.stages().len() }

    pub fn completed(&self) -> usize { self.stages().iter().filter(|(_, done)| *done).count() }

    /// Whole-number completion percentage, rounded down.
    pub fn percent(&self) -> u8 { (self.completed() * 100 / self.total()) as u8 }
}

/// Housing unit ("vivienda") inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    #[serde(rename = "proyecto_id")]
    pub project_id: Uuid,
    #[serde(rename = "nombre")]
    pub display_name: String,
    #[serde(flatten)]
    pub checklist: UnitChecklist,
    #[serde(rename = "detalles", default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "comentarios", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Ingreso,
    Gasto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "monto", default)]
    pub amount: f64,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(rename = "proyecto_id", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "categoria_gasto", default, skip_serializing_if = "Option::is_none")]
    pub expense_category: Option<String>,
    #[serde(rename = "comentarios", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl Transaction {
    pub fn visible_to(&self, caps: &Capabilities) -> bool {
        self.kind != TransactionKind::Ingreso || caps.can_view_income
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBalance {
    #[serde(rename = "ingresos")]
    pub income: f64,
    #[serde(rename = "gastos")]
    pub expenses: f64,
    pub balance: f64,
}

impl MonthlyBalance {
    pub fn for_month(transactions: &[Transaction], year: i32, month: u32) -> Self {
        let mut out = MonthlyBalance::default();
        for t in transactions.iter().filter(|t| t.date.year() == year && t.date.month() == month) {
            match t.kind {
                TransactionKind::Ingreso => out.income += t.amount,
                TransactionKind::Gasto => out.expenses += t.amount,
            }
        }
        out.balance = out.income - out.expenses;
        out
    }
}
