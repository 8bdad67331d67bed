// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::{ensure_not_past, local_now, optional_text, require_fecha, require_hora};
use crate::{
    availability::free_slots,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{fmt_fecha, fmt_hora, ok, ApiOk, AppState, Doctor, Horario, OkData, Rol},
    repo::{
        citas,
        doctores::{self, NuevoHorario},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctores", get(list_doctores))
        .route("/doctores/especialidades", get(list_especialidades))
        .route("/doctores/{doctor_id}", get(get_doctor))
        .route(
            "/doctores/{doctor_id}/horarios",
            get(list_horarios).post(create_horario),
        )
        .route("/doctores/{doctor_id}/disponibilidad", get(get_disponibilidad))
        .route("/horarios/{horario_id}", delete(delete_horario))
}

/// Admin, or the doctor that owns `doctor`.
fn ensure_manages(auth: &AuthContext, doctor: &Doctor) -> Result<(), ApiError> {
    if auth.is_admin() || (auth.rol == Rol::Doctor && doctor.usuario_id == auth.usuario_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Solo el propio doctor o un administrador pueden modificar su horario",
        ))
    }
}

/* ============================================================
   Directory
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DoctoresQuery {
    pub especialidad: Option<String>,
}

pub async fn list_doctores(
    State(state): State<AppState>,
    _auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<DoctoresQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<Doctor>>>, ApiError> {
    let especialidad = optional_text(q.especialidad);
    Ok(ok(doctores::list(&state.db, especialidad.as_deref()).await?))
}

pub async fn list_especialidades(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<String>>>, ApiError> {
    Ok(ok(doctores::especialidades(&state.db).await?))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    WithRejection(Path(doctor_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    Ok(ok(doctores::get(&state.db, doctor_id).await?))
}

/* ============================================================
   Horarios
   ============================================================ */

pub async fn list_horarios(
    State(state): State<AppState>,
    _auth: AuthContext,
    WithRejection(Path(doctor_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<Vec<Horario>>>, ApiError> {
    doctores::get(&state.db, doctor_id).await?;
    Ok(ok(doctores::list_horarios(&state.db, doctor_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorarioRequest {
    #[serde(alias = "dia_semana")]
    pub dia_semana: Option<i64>,
    #[serde(alias = "hora_inicio")]
    pub hora_inicio: Option<String>,
    #[serde(alias = "hora_fin")]
    pub hora_fin: Option<String>,
}

pub async fn create_horario(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(doctor_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<HorarioRequest>, ApiError>,
) -> Result<Json<ApiOk<Horario>>, ApiError> {
    let doctor = doctores::get(&state.db, doctor_id).await?;
    ensure_manages(&auth, &doctor)?;

    // 0 = domingo
    let dia_semana = req
        .dia_semana
        .filter(|d| (0..=6).contains(d))
        .ok_or_else(|| ApiError::validation("diaSemana debe estar entre 0 y 6"))?;
    let inicio = require_hora(req.hora_inicio.as_deref())?;
    let fin = require_hora(req.hora_fin.as_deref())?;
    if inicio >= fin {
        return Err(ApiError::validation(
            "horaInicio debe ser anterior a horaFin",
        ));
    }

    let horario = doctores::create_horario(
        &state.db,
        doctor_id,
        NuevoHorario {
            dia_semana,
            hora_inicio: fmt_hora(inicio),
            hora_fin: fmt_hora(fin),
        },
    )
    .await?;
    Ok(ok(horario))
}

pub async fn delete_horario(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(horario_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let horario = doctores::get_horario(&state.db, horario_id).await?;
    let doctor = doctores::get(&state.db, horario.doctor_id).await?;
    ensure_manages(&auth, &doctor)?;

    doctores::delete_horario(&state.db, horario_id).await?;
    Ok(ok(OkData { ok: true }))
}

/* ============================================================
   GET /doctores/{id}/disponibilidad?fecha=
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DisponibilidadQuery {
    pub fecha: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Disponibilidad {
    pub doctor_id: i64,
    pub fecha: String,
    pub slot_minutes: u32,
    pub horas: Vec<String>,
}

pub async fn get_disponibilidad(
    State(state): State<AppState>,
    _auth: AuthContext,
    WithRejection(Path(doctor_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Query(q), _): WithRejection<Query<DisponibilidadQuery>, ApiError>,
) -> Result<Json<ApiOk<Disponibilidad>>, ApiError> {
    let fecha = require_fecha(q.fecha.as_deref())?;
    let now = local_now();
    ensure_not_past(fecha, None, now)?;
    doctores::get(&state.db, doctor_id).await?;

    let fecha_str = fmt_fecha(fecha);
    let dia = i64::from(fecha.weekday().num_days_from_sunday());
    let horarios = doctores::horarios_for_day(&state.db, doctor_id, dia).await?;
    let booked = citas::booked_hours(&state.db, doctor_id, &fecha_str).await?;
    let not_before = (fecha == now.date()).then(|| now.time());

    let horas = free_slots(&horarios, &booked, state.slot_minutes, not_before);

    Ok(ok(Disponibilidad {
        doctor_id,
        fecha: fecha_str,
        slot_minutes: state.slot_minutes,
        horas,
    }))
}
