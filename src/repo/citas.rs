// src/repo/citas.rs

use chrono::NaiveDateTime;
use sqlx::{Executor, Sqlite, SqlitePool};

use super::{begin_write, RepoError, RepoResult, SQL_NOW};
use crate::models::{CitaDetalle, DoctorBrief, EstadoCita, PacienteBrief, Rol};

#[derive(Debug, sqlx::FromRow)]
struct CitaRow {
    id: i64,
    paciente_id: i64,
    doctor_id: i64,
    fecha: String,
    hora: String,
    estado: String,
    nota: Option<String>,
    fecha_creacion: String,
    fecha_actualizacion: String,
    paciente_nombre: String,
    paciente_correo: String,
    doctor_usuario_id: i64,
    doctor_nombre: String,
    doctor_correo: String,
    doctor_especialidad: String,
}

impl CitaRow {
    fn into_detalle(self) -> RepoResult<CitaDetalle> {
        let estado = self.estado.parse::<EstadoCita>().map_err(RepoError::Decode)?;
        Ok(CitaDetalle {
            id: self.id,
            paciente_id: self.paciente_id,
            doctor_id: self.doctor_id,
            fecha: self.fecha,
            hora: self.hora,
            estado,
            nota: self.nota,
            fecha_creacion: self.fecha_creacion,
            fecha_actualizacion: self.fecha_actualizacion,
            paciente: PacienteBrief {
                nombre_completo: self.paciente_nombre,
                correo: self.paciente_correo,
            },
            doctor: DoctorBrief {
                nombre_completo: self.doctor_nombre,
                correo: self.doctor_correo,
                especialidad: self.doctor_especialidad,
            },
            doctor_usuario_id: self.doctor_usuario_id,
        })
    }
}

const CITA_SELECT: &str = r#"
    SELECT
      c.id,
      c.paciente_id,
      c.doctor_id,
      c.fecha,
      c.hora,
      c.estado,
      c.nota,
      c.fecha_creacion,
      c.fecha_actualizacion,

      p.nombre || ' ' || p.apellido AS paciente_nombre,
      p.correo AS paciente_correo,

      d.usuario_id AS doctor_usuario_id,
      du.nombre || ' ' || du.apellido AS doctor_nombre,
      du.correo AS doctor_correo,
      d.especialidad AS doctor_especialidad

    FROM citas c
    JOIN usuarios p  ON p.id = c.paciente_id
    JOIN doctores d  ON d.id = c.doctor_id
    JOIN usuarios du ON du.id = d.usuario_id
"#;

fn collect(rows: Vec<CitaRow>) -> RepoResult<Vec<CitaDetalle>> {
    rows.into_iter().map(CitaRow::into_detalle).collect()
}

async fn fetch_detalle<'e, E>(exec: E, id: i64) -> RepoResult<Option<CitaDetalle>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{CITA_SELECT} WHERE c.id = ?");
    sqlx::query_as::<_, CitaRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?
        .map(CitaRow::into_detalle)
        .transpose()
}

/// True when a non-cancelled cita already holds the doctor's slot.
async fn slot_taken<'e, E>(
    exec: E,
    doctor_id: i64,
    fecha: &str,
    hora: &str,
    except_id: Option<i64>,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let hit: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM citas
        WHERE doctor_id = ? AND fecha = ? AND hora = ?
          AND estado <> 'Cancelada'
          AND (?4 IS NULL OR id <> ?4)
        LIMIT 1
        "#,
    )
    .bind(doctor_id)
    .bind(fecha)
    .bind(hora)
    .bind(except_id)
    .fetch_optional(exec)
    .await?;
    Ok(hit.is_some())
}

/* ============================================================
   Create
   ============================================================ */

/// Validated input; `fecha` is `YYYY-MM-DD`, `hora` is `HH:MM`.
#[derive(Debug, Clone)]
pub struct NuevaCita {
    pub paciente_id: i64,
    pub doctor_id: i64,
    pub fecha: String,
    pub hora: String,
    pub nota: Option<String>,
}

pub async fn create(pool: &SqlitePool, nueva: NuevaCita) -> RepoResult<CitaDetalle> {
    let mut tx = begin_write(pool).await?;

    let rol_id: Option<i64> = sqlx::query_scalar("SELECT rol_id FROM usuarios WHERE id = ?")
        .bind(nueva.paciente_id)
        .fetch_optional(&mut *tx)
        .await?;
    match rol_id.and_then(Rol::from_id) {
        None => return Err(RepoError::Validation("El paciente no existe".into())),
        Some(Rol::Paciente) => {}
        Some(_) => {
            return Err(RepoError::Validation(
                "El usuario indicado no es un paciente".into(),
            ))
        }
    }

    let doctor: Option<i64> = sqlx::query_scalar("SELECT id FROM doctores WHERE id = ?")
        .bind(nueva.doctor_id)
        .fetch_optional(&mut *tx)
        .await?;
    if doctor.is_none() {
        return Err(RepoError::Validation("El doctor no existe".into()));
    }

    if slot_taken(&mut *tx, nueva.doctor_id, &nueva.fecha, &nueva.hora, None).await? {
        return Err(RepoError::Conflict(
            "El doctor ya tiene una cita en ese horario".into(),
        ));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO citas (paciente_id, doctor_id, fecha, hora, estado, nota)
        VALUES (?, ?, ?, ?, 'Programada', ?)
        RETURNING id
        "#,
    )
    .bind(nueva.paciente_id)
    .bind(nueva.doctor_id)
    .bind(&nueva.fecha)
    .bind(&nueva.hora)
    .bind(&nueva.nota)
    .fetch_one(&mut *tx)
    .await?;

    let detalle = fetch_detalle(&mut *tx, id)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))?;

    tx.commit().await?;

    tracing::info!(
        cita_id = id,
        paciente_id = nueva.paciente_id,
        doctor_id = nueva.doctor_id,
        fecha = %nueva.fecha,
        hora = %nueva.hora,
        "cita created"
    );
    Ok(detalle)
}

/* ============================================================
   Reads
   ============================================================ */

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<CitaDetalle> {
    fetch_detalle(pool, id)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))
}

pub async fn list_all(pool: &SqlitePool) -> RepoResult<Vec<CitaDetalle>> {
    let sql = format!("{CITA_SELECT} ORDER BY c.fecha DESC, c.hora DESC, c.id DESC");
    let rows = sqlx::query_as::<_, CitaRow>(&sql).fetch_all(pool).await?;
    collect(rows)
}

pub async fn list_by_doctor_and_date(
    pool: &SqlitePool,
    doctor_id: i64,
    fecha: &str,
) -> RepoResult<Vec<CitaDetalle>> {
    let sql = format!(
        "{CITA_SELECT} WHERE c.doctor_id = ? AND c.fecha = ? ORDER BY c.hora ASC, c.id ASC"
    );
    let rows = sqlx::query_as::<_, CitaRow>(&sql)
        .bind(doctor_id)
        .bind(fecha)
        .fetch_all(pool)
        .await?;
    collect(rows)
}

/// Soonest `Programada` cita at or after `now` (local clinic time).
pub async fn upcoming_for_patient(
    pool: &SqlitePool,
    paciente_id: i64,
    now: NaiveDateTime,
) -> RepoResult<Option<CitaDetalle>> {
    let sql = format!(
        "{CITA_SELECT} WHERE c.paciente_id = ? AND c.estado = 'Programada' \
         AND (c.fecha || ' ' || c.hora || ':00') >= ? \
         ORDER BY c.fecha ASC, c.hora ASC LIMIT 1"
    );
    sqlx::query_as::<_, CitaRow>(&sql)
        .bind(paciente_id)
        .bind(now.format("%Y-%m-%d %H:%M:%S").to_string())
        .fetch_optional(pool)
        .await?
        .map(CitaRow::into_detalle)
        .transpose()
}

pub async fn history_for_patient(
    pool: &SqlitePool,
    paciente_id: i64,
) -> RepoResult<Vec<CitaDetalle>> {
    let sql = format!(
        "{CITA_SELECT} WHERE c.paciente_id = ? ORDER BY c.fecha DESC, c.hora DESC, c.id DESC"
    );
    let rows = sqlx::query_as::<_, CitaRow>(&sql)
        .bind(paciente_id)
        .fetch_all(pool)
        .await?;
    collect(rows)
}

/// Hours already held (non-cancelled) for a doctor on a date.
pub async fn booked_hours(pool: &SqlitePool, doctor_id: i64, fecha: &str) -> RepoResult<Vec<String>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT hora FROM citas
        WHERE doctor_id = ? AND fecha = ? AND estado <> 'Cancelada'
        ORDER BY hora ASC
        "#,
    )
    .bind(doctor_id)
    .bind(fecha)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_by_estado(pool: &SqlitePool) -> RepoResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT estado, COUNT(*) FROM citas GROUP BY estado ORDER BY estado ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_for_patient(pool: &SqlitePool, paciente_id: i64) -> RepoResult<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM citas WHERE paciente_id = ?")
        .bind(paciente_id)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/* ============================================================
   Mutations
   ============================================================ */

pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    estado: EstadoCita,
) -> RepoResult<CitaDetalle> {
    let mut tx = begin_write(pool).await?;

    let current: String = sqlx::query_scalar("SELECT estado FROM citas WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))?;
    let current = current.parse::<EstadoCita>().map_err(RepoError::Decode)?;

    if !current.can_transition_to(estado) {
        return Err(RepoError::InvalidTransition {
            from: current,
            to: estado,
        });
    }

    let sql = format!("UPDATE citas SET estado = ?, fecha_actualizacion = {SQL_NOW} WHERE id = ?");
    sqlx::query(&sql)
        .bind(estado.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let detalle = fetch_detalle(&mut *tx, id)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))?;

    tx.commit().await?;

    tracing::info!(cita_id = id, from = %current, to = %estado, "cita estado changed");
    Ok(detalle)
}

/// Moves a `Programada` cita to a new slot; the id and paciente stay.
pub async fn reschedule(
    pool: &SqlitePool,
    id: i64,
    fecha: &str,
    hora: &str,
    nota: Option<&str>,
) -> RepoResult<CitaDetalle> {
    let mut tx = begin_write(pool).await?;

    let row: (i64, String) = sqlx::query_as("SELECT doctor_id, estado FROM citas WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))?;
    let (doctor_id, estado) = row;

    if estado != EstadoCita::Programada.as_str() {
        return Err(RepoError::Conflict(format!(
            "Solo se pueden reprogramar citas programadas (estado actual: {estado})"
        )));
    }

    if slot_taken(&mut *tx, doctor_id, fecha, hora, Some(id)).await? {
        return Err(RepoError::Conflict(
            "El doctor ya tiene una cita en ese horario".into(),
        ));
    }

    let sql = format!(
        "UPDATE citas SET fecha = ?, hora = ?, nota = COALESCE(?, nota), \
         fecha_actualizacion = {SQL_NOW} WHERE id = ?"
    );
    sqlx::query(&sql)
        .bind(fecha)
        .bind(hora)
        .bind(nota)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let detalle = fetch_detalle(&mut *tx, id)
        .await?
        .ok_or(RepoError::NotFound("Cita no encontrada"))?;

    tx.commit().await?;

    tracing::info!(cita_id = id, fecha, hora, "cita rescheduled");
    Ok(detalle)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let res = sqlx::query("DELETE FROM citas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(RepoError::NotFound("Cita no encontrada"));
    }
    tracing::info!(cita_id = id, "cita deleted");
    Ok(())
}
