// src/repo/usuarios.rs

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{begin_write, RepoError, RepoResult, SQL_NOW};
use crate::models::{Rol, Usuario};

#[derive(Debug, sqlx::FromRow)]
pub struct UsuarioRow {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    pub password: String,
    pub rol_id: i64,
    pub fecha_creacion: String,
    pub doctor_id: Option<i64>,
    pub especialidad: Option<String>,
}

impl UsuarioRow {
    pub fn into_usuario(self) -> RepoResult<Usuario> {
        let rol = Rol::from_id(self.rol_id)
            .ok_or_else(|| RepoError::Decode(format!("rol_id {}", self.rol_id)))?;
        Ok(Usuario {
            id: self.id,
            nombre: self.nombre,
            apellido: self.apellido,
            correo: self.correo,
            rol,
            fecha_creacion: self.fecha_creacion,
            doctor_id: self.doctor_id,
            especialidad: self.especialidad,
        })
    }
}

const USUARIO_SELECT: &str = r#"
    SELECT u.id, u.nombre, u.apellido, u.correo, u.password, u.rol_id, u.fecha_creacion,
           d.id AS doctor_id, d.especialidad
    FROM usuarios u
    LEFT JOIN doctores d ON d.usuario_id = u.id
"#;

#[derive(Debug, Clone)]
pub struct NuevoUsuario {
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    /// Already hashed with argon2.
    pub password_hash: String,
    pub rol: Rol,
    /// Required when `rol` is doctor.
    pub especialidad: Option<String>,
}

pub async fn find_by_correo(pool: &SqlitePool, correo: &str) -> RepoResult<Option<UsuarioRow>> {
    let sql = format!("{USUARIO_SELECT} WHERE u.correo = ? COLLATE NOCASE");
    let row = sqlx::query_as::<_, UsuarioRow>(&sql)
        .bind(correo)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<UsuarioRow>> {
    let sql = format!("{USUARIO_SELECT} WHERE u.id = ?");
    let row = sqlx::query_as::<_, UsuarioRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<Usuario> {
    find_by_id(pool, id)
        .await?
        .ok_or(RepoError::NotFound("Usuario no encontrado"))?
        .into_usuario()
}

pub async fn list(pool: &SqlitePool, rol: Option<Rol>) -> RepoResult<Vec<Usuario>> {
    let sql = format!(
        "{USUARIO_SELECT} WHERE (?1 IS NULL OR u.rol_id = ?1) ORDER BY u.apellido ASC, u.nombre ASC"
    );
    sqlx::query_as::<_, UsuarioRow>(&sql)
        .bind(rol.map(Rol::id))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(UsuarioRow::into_usuario)
        .collect()
}

/// Inserts the usuario and, for doctors, the doctores extension row in the
/// same transaction.
pub async fn create(pool: &SqlitePool, nuevo: NuevoUsuario) -> RepoResult<Usuario> {
    let especialidad = match (nuevo.rol, nuevo.especialidad.as_deref().map(str::trim)) {
        (Rol::Doctor, Some(e)) if !e.is_empty() => Some(e.to_string()),
        (Rol::Doctor, _) => {
            return Err(RepoError::Validation(
                "especialidad es obligatoria para doctores".into(),
            ))
        }
        _ => None,
    };

    let mut tx = begin_write(pool).await?;

    let taken: Option<i64> =
        sqlx::query_scalar("SELECT id FROM usuarios WHERE correo = ? COLLATE NOCASE")
            .bind(&nuevo.correo)
            .fetch_optional(&mut *tx)
            .await?;
    if taken.is_some() {
        return Err(RepoError::Conflict("El correo ya está registrado".into()));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO usuarios (nombre, apellido, correo, password, rol_id)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&nuevo.nombre)
    .bind(&nuevo.apellido)
    .bind(&nuevo.correo)
    .bind(&nuevo.password_hash)
    .bind(nuevo.rol.id())
    .fetch_one(&mut *tx)
    .await?;

    if let Some(especialidad) = &especialidad {
        sqlx::query("INSERT INTO doctores (usuario_id, especialidad) VALUES (?, ?)")
            .bind(id)
            .bind(especialidad)
            .execute(&mut *tx)
            .await?;
    }

    let sql = format!("{USUARIO_SELECT} WHERE u.id = ?");
    let row = sqlx::query_as::<_, UsuarioRow>(&sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(usuario_id = id, rol = nuevo.rol.as_str(), "usuario created");
    row.into_usuario()
}

/// Stores the new hash and revokes every other active session of the
/// usuario; `keep_session` stays valid.
pub async fn update_password(
    pool: &SqlitePool,
    id: i64,
    password_hash: &str,
    keep_session: Uuid,
) -> RepoResult<u64> {
    let mut tx = begin_write(pool).await?;

    let res = sqlx::query("UPDATE usuarios SET password = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(RepoError::NotFound("Usuario no encontrado"));
    }

    let sql = format!(
        r#"
        UPDATE session_token
        SET revoked_at = {SQL_NOW}
        WHERE usuario_id = ?
          AND revoked_at IS NULL
          AND session_token_id <> ?
        "#
    );
    let revoked = sqlx::query(&sql)
        .bind(id)
        .bind(keep_session.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    tracing::info!(usuario_id = id, revoked, "password changed");
    Ok(revoked)
}

/// Cascades to doctores, citas, horarios, notas and sessions.
pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let res = sqlx::query("DELETE FROM usuarios WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(RepoError::NotFound("Usuario no encontrado"));
    }
    tracing::info!(usuario_id = id, "usuario deleted");
    Ok(())
}

/// Returns the role of the usuario, or `None` when the id does not exist.
pub async fn rol_of(pool: &SqlitePool, id: i64) -> RepoResult<Option<Rol>> {
    let rol_id: Option<i64> = sqlx::query_scalar("SELECT rol_id FROM usuarios WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(rol_id.and_then(Rol::from_id))
}

pub async fn count_by_rol(pool: &SqlitePool) -> RepoResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT r.nombre, COUNT(u.id)
        FROM roles r
        LEFT JOIN usuarios u ON u.rol_id = r.id
        GROUP BY r.id, r.nombre
        ORDER BY r.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
