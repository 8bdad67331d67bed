// src/repo/doctores.rs

use sqlx::SqlitePool;

use super::{RepoError, RepoResult};
use crate::models::{Doctor, Horario};

#[derive(Debug, sqlx::FromRow)]
struct DoctorRow {
    id: i64,
    usuario_id: i64,
    nombre_completo: String,
    correo: String,
    especialidad: String,
}

impl From<DoctorRow> for Doctor {
    fn from(r: DoctorRow) -> Self {
        Doctor {
            id: r.id,
            usuario_id: r.usuario_id,
            nombre_completo: r.nombre_completo,
            correo: r.correo,
            especialidad: r.especialidad,
        }
    }
}

const DOCTOR_SELECT: &str = r#"
    SELECT d.id, d.usuario_id,
           u.nombre || ' ' || u.apellido AS nombre_completo,
           u.correo, d.especialidad
    FROM doctores d
    JOIN usuarios u ON u.id = d.usuario_id
"#;

/// Doctors, optionally filtered by specialty (case-insensitive).
pub async fn list(pool: &SqlitePool, especialidad: Option<&str>) -> RepoResult<Vec<Doctor>> {
    let sql = format!(
        "{DOCTOR_SELECT} WHERE (?1 IS NULL OR d.especialidad = ?1 COLLATE NOCASE) \
         ORDER BY u.apellido ASC, u.nombre ASC"
    );
    let rows = sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(especialidad)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Doctor::from).collect())
}

pub async fn especialidades(pool: &SqlitePool) -> RepoResult<Vec<String>> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT especialidad FROM doctores ORDER BY especialidad ASC")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<Doctor> {
    let sql = format!("{DOCTOR_SELECT} WHERE d.id = ?");
    sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Doctor::from)
        .ok_or(RepoError::NotFound("Doctor no encontrado"))
}

pub async fn find_by_usuario(pool: &SqlitePool, usuario_id: i64) -> RepoResult<Option<Doctor>> {
    let sql = format!("{DOCTOR_SELECT} WHERE d.usuario_id = ?");
    let row = sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(usuario_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Doctor::from))
}

/* ============================================================
   Horarios
   ============================================================ */

#[derive(Debug, Clone)]
pub struct NuevoHorario {
    pub dia_semana: i64,
    pub hora_inicio: String,
    pub hora_fin: String,
}

pub async fn list_horarios(pool: &SqlitePool, doctor_id: i64) -> RepoResult<Vec<Horario>> {
    let rows = sqlx::query_as::<_, Horario>(
        r#"
        SELECT id, doctor_id, dia_semana, hora_inicio, hora_fin
        FROM horarios
        WHERE doctor_id = ?
        ORDER BY dia_semana ASC, hora_inicio ASC
        "#,
    )
    .bind(doctor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn horarios_for_day(
    pool: &SqlitePool,
    doctor_id: i64,
    dia_semana: i64,
) -> RepoResult<Vec<Horario>> {
    let rows = sqlx::query_as::<_, Horario>(
        r#"
        SELECT id, doctor_id, dia_semana, hora_inicio, hora_fin
        FROM horarios
        WHERE doctor_id = ? AND dia_semana = ?
        ORDER BY hora_inicio ASC
        "#,
    )
    .bind(doctor_id)
    .bind(dia_semana)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Caller validates day range and `hora_inicio < hora_fin`; the table
/// CHECKs back that up.
pub async fn create_horario(
    pool: &SqlitePool,
    doctor_id: i64,
    nuevo: NuevoHorario,
) -> RepoResult<Horario> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM doctores WHERE id = ?")
        .bind(doctor_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(RepoError::NotFound("Doctor no encontrado"));
    }

    let overlapping: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM horarios
        WHERE doctor_id = ? AND dia_semana = ?
          AND hora_inicio < ? AND ? < hora_fin
        LIMIT 1
        "#,
    )
    .bind(doctor_id)
    .bind(nuevo.dia_semana)
    .bind(&nuevo.hora_fin)
    .bind(&nuevo.hora_inicio)
    .fetch_optional(pool)
    .await?;
    if overlapping.is_some() {
        return Err(RepoError::Conflict(
            "El horario se solapa con otro existente".into(),
        ));
    }

    let row = sqlx::query_as::<_, Horario>(
        r#"
        INSERT INTO horarios (doctor_id, dia_semana, hora_inicio, hora_fin)
        VALUES (?, ?, ?, ?)
        RETURNING id, doctor_id, dia_semana, hora_inicio, hora_fin
        "#,
    )
    .bind(doctor_id)
    .bind(nuevo.dia_semana)
    .bind(&nuevo.hora_inicio)
    .bind(&nuevo.hora_fin)
    .fetch_one(pool)
    .await?;

    tracing::info!(horario_id = row.id, doctor_id, "horario created");
    Ok(row)
}

pub async fn get_horario(pool: &SqlitePool, id: i64) -> RepoResult<Horario> {
    sqlx::query_as::<_, Horario>(
        "SELECT id, doctor_id, dia_semana, hora_inicio, hora_fin FROM horarios WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RepoError::NotFound("Horario no encontrado"))
}

pub async fn delete_horario(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let res = sqlx::query("DELETE FROM horarios WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(RepoError::NotFound("Horario no encontrado"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing;

    fn window(dia: i64, inicio: &str, fin: &str) -> NuevoHorario {
        NuevoHorario {
            dia_semana: dia,
            hora_inicio: inicio.into(),
            hora_fin: fin.into(),
        }
    }

    #[tokio::test]
    async fn filters_by_especialidad_case_insensitively() {
        let pool = testing::pool().await;
        testing::doctor(&pool, "a@x.com", "Ortodoncia").await;
        testing::doctor(&pool, "b@x.com", "Endodoncia").await;

        let orto = list(&pool, Some("ortodoncia")).await.unwrap();
        assert_eq!(orto.len(), 1);
        assert_eq!(orto[0].correo, "a@x.com");
        assert_eq!(list(&pool, None).await.unwrap().len(), 2);
        assert_eq!(
            especialidades(&pool).await.unwrap(),
            vec!["Endodoncia".to_string(), "Ortodoncia".to_string()]
        );
    }

    #[tokio::test]
    async fn overlapping_windows_are_rejected() {
        let pool = testing::pool().await;
        let (_, doctor_id) = testing::doctor(&pool, "a@x.com", "Ortodoncia").await;

        create_horario(&pool, doctor_id, window(1, "09:00", "12:00")).await.unwrap();
        let err = create_horario(&pool, doctor_id, window(1, "11:00", "13:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        // touching edges is fine, so is another day
        create_horario(&pool, doctor_id, window(1, "12:00", "14:00")).await.unwrap();
        create_horario(&pool, doctor_id, window(2, "09:00", "12:00")).await.unwrap();

        let all = list_horarios(&pool, doctor_id).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(horarios_for_day(&pool, doctor_id, 1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn horario_for_unknown_doctor_is_not_found() {
        let pool = testing::pool().await;
        let err = create_horario(&pool, 42, window(1, "09:00", "10:00")).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
