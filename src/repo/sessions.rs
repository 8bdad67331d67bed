// src/repo/sessions.rs

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{sql_timestamp, RepoError, RepoResult, SQL_NOW};

#[derive(Debug)]
pub struct SessionLookup {
    pub session_token_id: Uuid,
    pub usuario_id: i64,
    pub rol_id: i64,
}

fn parse_id(raw: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| RepoError::Decode(format!("session_token_id: {e}")))
}

pub async fn create(
    pool: &SqlitePool,
    usuario_id: i64,
    token_hash: &str,
    device_name: Option<&str>,
    expires_at: DateTime<Utc>,
) -> RepoResult<Uuid> {
    let session_token_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO session_token
            (session_token_id, usuario_id, session_token_hash, device_name, expires_at)
        VALUES
            (?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_token_id.to_string())
    .bind(usuario_id)
    .bind(token_hash)
    .bind(device_name)
    .bind(sql_timestamp(expires_at))
    .execute(pool)
    .await?;
    Ok(session_token_id)
}

/// Active (not revoked, not expired) session for a token hash.
pub async fn lookup(pool: &SqlitePool, token_hash: &str) -> RepoResult<Option<SessionLookup>> {
    let sql = format!(
        r#"
        SELECT st.session_token_id, st.usuario_id, u.rol_id
        FROM session_token st
        JOIN usuarios u ON u.id = st.usuario_id
        WHERE st.session_token_hash = ?
          AND st.revoked_at IS NULL
          AND st.expires_at > {SQL_NOW}
        "#
    );
    let row: Option<(String, i64, i64)> = sqlx::query_as(&sql)
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

    row.map(|(id, usuario_id, rol_id)| {
        Ok(SessionLookup {
            session_token_id: parse_id(&id)?,
            usuario_id,
            rol_id,
        })
    })
    .transpose()
}

/// Best-effort; failures are ignored by the caller.
pub async fn touch(pool: &SqlitePool, session_token_id: Uuid) -> RepoResult<()> {
    let sql = format!("UPDATE session_token SET last_seen_at = {SQL_NOW} WHERE session_token_id = ?");
    sqlx::query(&sql)
        .bind(session_token_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn expires_at(
    pool: &SqlitePool,
    session_token_id: Uuid,
    usuario_id: i64,
) -> RepoResult<Option<DateTime<Utc>>> {
    let sql = format!(
        r#"
        SELECT expires_at
        FROM session_token
        WHERE session_token_id = ?
          AND usuario_id = ?
          AND revoked_at IS NULL
          AND expires_at > {SQL_NOW}
        "#
    );
    let raw: Option<String> = sqlx::query_scalar(&sql)
        .bind(session_token_id.to_string())
        .bind(usuario_id)
        .fetch_optional(pool)
        .await?;

    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::Decode(format!("expires_at: {e}")))
    })
    .transpose()
}

/// Returns false when the session was already revoked or is not the caller's.
pub async fn revoke(pool: &SqlitePool, session_token_id: Uuid, usuario_id: i64) -> RepoResult<bool> {
    let sql = format!(
        r#"
        UPDATE session_token
        SET revoked_at = {SQL_NOW}
        WHERE session_token_id = ?
          AND usuario_id = ?
          AND revoked_at IS NULL
        "#
    );
    let res = sqlx::query(&sql)
        .bind(session_token_id.to_string())
        .bind(usuario_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
