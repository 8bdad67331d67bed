// src/routes/cita_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::{ensure_not_past, local_now, optional_text, require_fecha, require_hora, require_id};
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{fmt_fecha, fmt_hora, ok, ApiOk, AppState, CitaDetalle, CrearCitaRequest, EstadoCita, OkData, Rol},
    repo::{
        citas::{self, NuevaCita},
        doctores,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_citas).post(create_cita))
        .route("/proxima", get(get_proxima))
        .route("/historial", get(get_historial))
        .route("/doctor/{doctor_id}", get(list_doctor_day))
        .route(
            "/{cita_id}",
            get(get_cita).put(reschedule_cita).delete(delete_cita),
        )
        .route("/{cita_id}/estado", put(update_estado))
}

/* ============================================================
   Access rules
   ============================================================ */

fn owns_as_paciente(auth: &AuthContext, cita: &CitaDetalle) -> bool {
    auth.rol == Rol::Paciente && cita.paciente_id == auth.usuario_id
}

fn owns_as_doctor(auth: &AuthContext, cita: &CitaDetalle) -> bool {
    auth.rol == Rol::Doctor && cita.doctor_usuario_id == auth.usuario_id
}

fn ensure_can_view(auth: &AuthContext, cita: &CitaDetalle) -> Result<(), ApiError> {
    if auth.is_admin() || owns_as_paciente(auth, cita) || owns_as_doctor(auth, cita) {
        Ok(())
    } else {
        Err(ApiError::forbidden("No tiene acceso a esta cita"))
    }
}

/// Admin and doctors may look up any paciente; a paciente only themself
/// (and may omit the id).
fn resolve_paciente(auth: &AuthContext, requested: Option<i64>) -> Result<i64, ApiError> {
    match auth.rol {
        Rol::Paciente => match requested {
            None => Ok(auth.usuario_id),
            Some(id) if id == auth.usuario_id => Ok(id),
            Some(_) => Err(ApiError::forbidden(
                "Solo puede consultar sus propias citas",
            )),
        },
        Rol::Admin | Rol::Doctor => require_id(requested, "usuario_id"),
    }
}

/* ============================================================
   POST /citas
   ============================================================ */

pub async fn create_cita(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<CrearCitaRequest>, ApiError>,
) -> Result<Json<ApiOk<CitaDetalle>>, ApiError> {
    auth.require(&[Rol::Admin, Rol::Paciente])?;

    let paciente_id = match auth.rol {
        Rol::Paciente => req.paciente_id.unwrap_or(auth.usuario_id),
        _ => require_id(req.paciente_id, "pacienteId")?,
    };
    if auth.rol == Rol::Paciente && paciente_id != auth.usuario_id {
        return Err(ApiError::forbidden(
            "Un paciente solo puede reservar citas para sí mismo",
        ));
    }

    let doctor_id = require_id(req.doctor_id, "doctorId")?;
    let fecha = require_fecha(req.fecha.as_deref())?;
    let hora = require_hora(req.hora.as_deref())?;
    ensure_not_past(fecha, Some(hora), local_now())?;

    let cita = citas::create(
        &state.db,
        NuevaCita {
            paciente_id,
            doctor_id,
            fecha: fmt_fecha(fecha),
            hora: fmt_hora(hora),
            nota: optional_text(req.nota),
        },
    )
    .await?;

    Ok(ok(cita))
}

/* ============================================================
   GET /citas (admin)
   ============================================================ */

pub async fn list_citas(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<CitaDetalle>>>, ApiError> {
    auth.require(&[Rol::Admin])?;
    Ok(ok(citas::list_all(&state.db).await?))
}

/* ============================================================
   GET /citas/{id}
   ============================================================ */

pub async fn get_cita(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(cita_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<CitaDetalle>>, ApiError> {
    let cita = citas::get(&state.db, cita_id).await?;
    ensure_can_view(&auth, &cita)?;
    Ok(ok(cita))
}

/* ============================================================
   GET /citas/doctor/{doctor_id}?fecha=
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct FechaQuery {
    pub fecha: Option<String>,
}

pub async fn list_doctor_day(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(doctor_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Query(q), _): WithRejection<Query<FechaQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<CitaDetalle>>>, ApiError> {
    auth.require(&[Rol::Admin, Rol::Doctor])?;
    let fecha = require_fecha(q.fecha.as_deref())?;

    let doctor = doctores::get(&state.db, doctor_id).await?;
    if auth.rol == Rol::Doctor && doctor.usuario_id != auth.usuario_id {
        return Err(ApiError::forbidden(
            "Un doctor solo puede ver su propia agenda",
        ));
    }

    let rows = citas::list_by_doctor_and_date(&state.db, doctor_id, &fmt_fecha(fecha)).await?;
    Ok(ok(rows))
}

/* ============================================================
   GET /citas/proxima, /citas/historial
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UsuarioQuery {
    pub usuario_id: Option<i64>,
}

pub async fn get_proxima(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<UsuarioQuery>, ApiError>,
) -> Result<Json<ApiOk<Option<CitaDetalle>>>, ApiError> {
    let paciente_id = resolve_paciente(&auth, q.usuario_id)?;
    let next = citas::upcoming_for_patient(&state.db, paciente_id, local_now()).await?;
    Ok(ok(next))
}

pub async fn get_historial(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<UsuarioQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<CitaDetalle>>>, ApiError> {
    let paciente_id = resolve_paciente(&auth, q.usuario_id)?;
    Ok(ok(citas::history_for_patient(&state.db, paciente_id).await?))
}

/* ============================================================
   PUT /citas/{id}/estado
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct EstadoRequest {
    pub estado: Option<String>,
}

pub async fn update_estado(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(cita_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<EstadoRequest>, ApiError>,
) -> Result<Json<ApiOk<CitaDetalle>>, ApiError> {
    let raw = req
        .estado
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("estado es obligatorio"))?;
    let estado = raw.parse::<EstadoCita>().map_err(|_| {
        ApiError::validation(format!(
            "estado no válido: {raw} (Programada, Completada o Cancelada)"
        ))
    })?;

    let cita = citas::get(&state.db, cita_id).await?;
    let allowed = auth.is_admin()
        || owns_as_doctor(&auth, &cita)
        || (owns_as_paciente(&auth, &cita) && estado == EstadoCita::Cancelada);
    if !allowed {
        ensure_can_view(&auth, &cita)?;
        return Err(ApiError::forbidden(
            "Un paciente solo puede cancelar sus citas",
        ));
    }

    let updated = citas::update_status(&state.db, cita_id, estado).await?;
    Ok(ok(updated))
}

/* ============================================================
   PUT /citas/{id}  (reschedule)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ReprogramarRequest {
    pub fecha: Option<String>,
    pub hora: Option<String>,
    pub nota: Option<String>,
}

pub async fn reschedule_cita(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(cita_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ReprogramarRequest>, ApiError>,
) -> Result<Json<ApiOk<CitaDetalle>>, ApiError> {
    let fecha = require_fecha(req.fecha.as_deref())?;
    let hora = require_hora(req.hora.as_deref())?;
    ensure_not_past(fecha, Some(hora), local_now())?;

    let cita = citas::get(&state.db, cita_id).await?;
    if !(auth.is_admin() || owns_as_paciente(&auth, &cita)) {
        return Err(ApiError::forbidden(
            "Solo el paciente o un administrador pueden reprogramar la cita",
        ));
    }

    let nota = optional_text(req.nota);
    let moved = citas::reschedule(
        &state.db,
        cita_id,
        &fmt_fecha(fecha),
        &fmt_hora(hora),
        nota.as_deref(),
    )
    .await?;
    Ok(ok(moved))
}

/* ============================================================
   DELETE /citas/{id}
   ============================================================ */

pub async fn delete_cita(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(cita_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let cita = citas::get(&state.db, cita_id).await?;
    if !(auth.is_admin() || owns_as_paciente(&auth, &cita)) {
        return Err(ApiError::forbidden(
            "Solo el paciente o un administrador pueden eliminar la cita",
        ));
    }
    citas::delete(&state.db, cita_id).await?;
    Ok(ok(OkData { ok: true }))
}
