// src/routes/nota_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::{optional_text, require_id};
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ok, ApiOk, AppState, Nota, OkData, Rol},
    repo::{doctores, notas},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notas).post(create_nota))
        .route("/{nota_id}", delete(delete_nota))
}

#[derive(Debug, Deserialize)]
pub struct NotasQuery {
    pub paciente_id: Option<i64>,
}

pub async fn list_notas(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<NotasQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<Nota>>>, ApiError> {
    let paciente_id = match auth.rol {
        Rol::Paciente => {
            let id = q.paciente_id.unwrap_or(auth.usuario_id);
            if id != auth.usuario_id {
                return Err(ApiError::forbidden("Solo puede ver sus propias notas"));
            }
            id
        }
        Rol::Admin | Rol::Doctor => require_id(q.paciente_id, "paciente_id")?,
    };
    Ok(ok(notas::list_for_patient(&state.db, paciente_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrearNotaRequest {
    #[serde(alias = "paciente_id")]
    pub paciente_id: Option<i64>,
    #[serde(alias = "doctor_id")]
    pub doctor_id: Option<i64>,
    pub contenido: Option<String>,
}

pub async fn create_nota(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<CrearNotaRequest>, ApiError>,
) -> Result<Json<ApiOk<Nota>>, ApiError> {
    auth.require(&[Rol::Admin, Rol::Doctor])?;

    let paciente_id = require_id(req.paciente_id, "pacienteId")?;
    let contenido = optional_text(req.contenido)
        .ok_or_else(|| ApiError::validation("contenido es obligatorio"))?;

    // a doctor always writes as themself
    let doctor_id = match auth.rol {
        Rol::Doctor => {
            let doctor = doctores::find_by_usuario(&state.db, auth.usuario_id)
                .await?
                .ok_or_else(|| ApiError::Internal(format!(
                    "usuario {} has rol doctor but no doctores row",
                    auth.usuario_id
                )))?;
            Some(doctor.id)
        }
        _ => req.doctor_id,
    };

    let nota = notas::create(&state.db, paciente_id, doctor_id, &contenido).await?;
    Ok(ok(nota))
}

pub async fn delete_nota(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(nota_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let nota = notas::get(&state.db, nota_id).await?;

    if !auth.is_admin() {
        let own = match (auth.rol, nota.doctor_id) {
            (Rol::Doctor, Some(doctor_id)) => doctores::get(&state.db, doctor_id)
                .await?
                .usuario_id
                == auth.usuario_id,
            _ => false,
        };
        if !own {
            return Err(ApiError::forbidden(
                "Solo el autor o un administrador pueden eliminar la nota",
            ));
        }
    }

    notas::delete(&state.db, nota_id).await?;
    Ok(ok(OkData { ok: true }))
}
