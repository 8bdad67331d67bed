use std::{fmt, str::FromStr};

use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub session_ttl_hours: i64,
    pub slot_minutes: u32,
}

pub const FECHA_FMT: &str = "%Y-%m-%d";
pub const HORA_FMT: &str = "%H:%M";

/* -------------------------
   Envelope
--------------------------*/

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiOk<T>> {
    Json(ApiOk {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Roles
--------------------------*/

/// Role ids match the seeded `roles` table: 1 admin, 2 doctor, 3 paciente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Doctor,
    Paciente,
}

impl Rol {
    pub fn id(self) -> i64 {
        match self {
            Rol::Admin => 1,
            Rol::Doctor => 2,
            Rol::Paciente => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Rol::Admin),
            2 => Some(Rol::Doctor),
            3 => Some(Rol::Paciente),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rol::Admin => "admin",
            Rol::Doctor => "doctor",
            Rol::Paciente => "paciente",
        }
    }
}

impl FromStr for Rol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Rol::Admin),
            "doctor" => Ok(Rol::Doctor),
            "paciente" => Ok(Rol::Paciente),
            other => Err(format!("rol desconocido: {other}")),
        }
    }
}

/* -------------------------
   Appointment status
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstadoCita {
    Programada,
    Completada,
    Cancelada,
}

impl EstadoCita {
    pub fn as_str(self) -> &'static str {
        match self {
            EstadoCita::Programada => "Programada",
            EstadoCita::Completada => "Completada",
            EstadoCita::Cancelada => "Cancelada",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, EstadoCita::Programada)
    }

    /// Programada -> {Completada, Cancelada}; everything else is rejected,
    /// including re-applying the current status.
    pub fn can_transition_to(self, next: EstadoCita) -> bool {
        matches!(
            (self, next),
            (EstadoCita::Programada, EstadoCita::Completada)
                | (EstadoCita::Programada, EstadoCita::Cancelada)
        )
    }
}

impl fmt::Display for EstadoCita {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstadoCita {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Programada" => Ok(EstadoCita::Programada),
            "Completada" => Ok(EstadoCita::Completada),
            "Cancelada" => Ok(EstadoCita::Cancelada),
            other => Err(format!("estado desconocido: {other}")),
        }
    }
}

/* -------------------------
   Date / time helpers
--------------------------*/

pub fn parse_fecha(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), FECHA_FMT).ok()
}

pub fn parse_hora(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), HORA_FMT).ok()
}

pub fn fmt_fecha(d: NaiveDate) -> String {
    d.format(FECHA_FMT).to_string()
}

pub fn fmt_hora(t: NaiveTime) -> String {
    t.format(HORA_FMT).to_string()
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacienteBrief {
    pub nombre_completo: String,
    pub correo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorBrief {
    pub nombre_completo: String,
    pub correo: String,
    pub especialidad: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitaDetalle {
    pub id: i64,
    pub paciente_id: i64,
    pub doctor_id: i64,
    pub fecha: String,
    pub hora: String,
    pub estado: EstadoCita,
    pub nota: Option<String>,
    pub fecha_creacion: String,
    pub fecha_actualizacion: String,
    pub paciente: PacienteBrief,
    pub doctor: DoctorBrief,
    /// usuarios.id behind doctor_id; used for ownership checks only.
    #[serde(skip)]
    pub doctor_usuario_id: i64,
}

/// Body of `POST /api/citas`. Fields are optional so that a missing one is
/// reported with a readable 400 instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrearCitaRequest {
    #[serde(alias = "paciente_id")]
    pub paciente_id: Option<i64>,
    #[serde(alias = "doctor_id")]
    pub doctor_id: Option<i64>,
    pub fecha: Option<String>,
    pub hora: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nota: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usuario {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    pub rol: Rol,
    pub fecha_creacion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub especialidad: Option<String>,
}

impl Usuario {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellido)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: i64,
    pub usuario_id: i64,
    pub nombre_completo: String,
    pub correo: String,
    pub especialidad: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Horario {
    pub id: i64,
    pub doctor_id: i64,
    pub dia_semana: i64,
    pub hora_inicio: String,
    pub hora_fin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Nota {
    pub id: i64,
    pub paciente_id: i64,
    pub doctor_id: Option<i64>,
    pub doctor_nombre: Option<String>,
    pub contenido: String,
    pub fecha_creacion: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub correo: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub usuario: Usuario,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub usuario: Usuario,
    pub session_token_id: uuid::Uuid,
    pub expires_at: DateTime<Utc>,
}
