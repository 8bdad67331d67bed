use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::local_now;
use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, CitaDetalle, Rol, fmt_fecha, ok};
use crate::repo::{citas, doctores, usuarios};

/// Role-shaped dashboard; `view` tells the client which one it got.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum HomeData {
    Paciente {
        proxima_cita: Option<CitaDetalle>,
        total_citas: i64,
    },
    Doctor {
        doctor_id: i64,
        fecha: String,
        citas: Vec<CitaDetalle>,
    },
    Admin {
        usuarios_por_rol: BTreeMap<String, i64>,
        citas_por_estado: BTreeMap<String, i64>,
    },
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

pub async fn home(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<HomeData>>, ApiError> {
    let now = local_now();

    let data = match auth.rol {
        Rol::Paciente => HomeData::Paciente {
            proxima_cita: citas::upcoming_for_patient(&state.db, auth.usuario_id, now).await?,
            total_citas: citas::count_for_patient(&state.db, auth.usuario_id).await?,
        },
        Rol::Doctor => {
            let doctor = doctores::find_by_usuario(&state.db, auth.usuario_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Doctor no encontrado".into()))?;
            let fecha = fmt_fecha(now.date());
            let citas = citas::list_by_doctor_and_date(&state.db, doctor.id, &fecha).await?;
            HomeData::Doctor {
                doctor_id: doctor.id,
                fecha,
                citas,
            }
        }
        Rol::Admin => HomeData::Admin {
            usuarios_por_rol: usuarios::count_by_rol(&state.db).await?.into_iter().collect(),
            citas_por_estado: citas::count_by_estado(&state.db).await?.into_iter().collect(),
        },
    };

    Ok(ok(data))
}
