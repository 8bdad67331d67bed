use crate::{
    error::ApiError,
    models::{parse_fecha, parse_hora, AppState},
};
use axum::Router;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

pub mod auth_routes;
pub mod cita_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod nota_routes;
pub mod usuario_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/usuarios", usuario_routes::router())
        .nest("/api/citas", cita_routes::router())
        .nest("/api/notas", nota_routes::router())
        .nest("/api", doctor_routes::router().merge(home_routes::router()))
        .with_state(state)
}

/* -------------------------
   Shared input checks
--------------------------*/

/// Clinic-local wall clock; fecha/hora columns carry no timezone.
pub(crate) fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn require_id(value: Option<i64>, field: &str) -> Result<i64, ApiError> {
    match value {
        Some(id) if id > 0 => Ok(id),
        Some(_) => Err(ApiError::validation(format!("{field} no es válido"))),
        None => Err(ApiError::validation(format!("{field} es obligatorio"))),
    }
}

pub(crate) fn require_fecha(value: Option<&str>) -> Result<NaiveDate, ApiError> {
    let raw = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("fecha es obligatoria"))?;
    parse_fecha(raw).ok_or_else(|| ApiError::validation("fecha debe tener formato YYYY-MM-DD"))
}

pub(crate) fn require_hora(value: Option<&str>) -> Result<NaiveTime, ApiError> {
    let raw = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("hora es obligatoria"))?;
    parse_hora(raw).ok_or_else(|| ApiError::validation("hora debe tener formato HH:MM"))
}

/// Rejects a (fecha, hora) that is already behind `now`.
pub(crate) fn ensure_not_past(
    fecha: NaiveDate,
    hora: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Result<(), ApiError> {
    if fecha < now.date() {
        return Err(ApiError::validation("No se puede usar una fecha pasada"));
    }
    if let Some(hora) = hora {
        if fecha == now.date() && hora < now.time() {
            return Err(ApiError::validation("La hora seleccionada ya pasó"));
        }
    }
    Ok(())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn at(fecha: &str, hora: &str) -> NaiveDateTime {
        parse_fecha(fecha).unwrap().and_time(parse_hora(hora).unwrap())
    }

    #[test]
    fn past_checks_compare_date_then_time() {
        let now = at("2025-11-20", "10:00");
        assert!(ensure_not_past(parse_fecha("2025-11-19").unwrap(), None, now).is_err());
        assert!(ensure_not_past(parse_fecha("2025-11-20").unwrap(), None, now).is_ok());
        assert!(ensure_not_past(parse_fecha("2025-11-20").unwrap(), parse_hora("09:59"), now).is_err());
        assert!(ensure_not_past(parse_fecha("2025-11-20").unwrap(), parse_hora("10:00"), now).is_ok());
        assert!(ensure_not_past(parse_fecha("2025-11-21").unwrap(), parse_hora("06:00"), now).is_ok());
    }

    #[test]
    fn ids_must_be_present_and_positive() {
        assert_eq!(require_id(Some(3), "doctorId").ok(), Some(3));
        assert!(require_id(Some(0), "doctorId").is_err());
        assert!(require_id(None, "doctorId").is_err());
    }

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" hola ".into())).as_deref(), Some("hola"));
    }
}
