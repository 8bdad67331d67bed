// src/repo/notas.rs

use sqlx::SqlitePool;

use super::{usuarios, RepoError, RepoResult};
use crate::models::{Nota, Rol};

const NOTA_SELECT: &str = r#"
    SELECT n.id, n.paciente_id, n.doctor_id,
           CASE WHEN u.id IS NULL THEN NULL ELSE u.nombre || ' ' || u.apellido END AS doctor_nombre,
           n.contenido, n.fecha_creacion
    FROM notas n
    LEFT JOIN doctores d ON d.id = n.doctor_id
    LEFT JOIN usuarios u ON u.id = d.usuario_id
"#;

pub async fn list_for_patient(pool: &SqlitePool, paciente_id: i64) -> RepoResult<Vec<Nota>> {
    let sql = format!("{NOTA_SELECT} WHERE n.paciente_id = ? ORDER BY n.fecha_creacion DESC, n.id DESC");
    let rows = sqlx::query_as::<_, Nota>(&sql)
        .bind(paciente_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<Nota> {
    let sql = format!("{NOTA_SELECT} WHERE n.id = ?");
    sqlx::query_as::<_, Nota>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("Nota no encontrada"))
}

pub async fn create(
    pool: &SqlitePool,
    paciente_id: i64,
    doctor_id: Option<i64>,
    contenido: &str,
) -> RepoResult<Nota> {
    if usuarios::rol_of(pool, paciente_id).await? != Some(Rol::Paciente) {
        return Err(RepoError::Validation("El paciente no existe".into()));
    }

    if let Some(doctor_id) = doctor_id {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM doctores WHERE id = ?")
            .bind(doctor_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(RepoError::Validation("El doctor no existe".into()));
        }
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO notas (paciente_id, doctor_id, contenido) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(paciente_id)
    .bind(doctor_id)
    .bind(contenido)
    .fetch_one(pool)
    .await?;

    tracing::info!(nota_id = id, paciente_id, "nota created");
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let res = sqlx::query("DELETE FROM notas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(RepoError::NotFound("Nota no encontrada"));
    }
    Ok(())
}
