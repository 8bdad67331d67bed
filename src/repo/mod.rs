//! Row-level operations against the SQLite store.
//!
//! Every function takes the pool (or an open transaction) and returns
//! [`RepoError`]; mapping to HTTP statuses happens in `crate::error`.

use crate::models::EstadoCita;

pub mod citas;
pub mod doctores;
pub mod notas;
pub mod sessions;
pub mod usuarios;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("transición de estado no permitida: {from} -> {to}")]
    InvalidTransition { from: EstadoCita, to: EstadoCita },
    #[error("decode: {0}")]
    Decode(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

pub const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

/// Timestamps are stored as `YYYY-MM-DDTHH:MM:SSZ` text so that string
/// comparison in SQL matches chronological order.
pub fn sql_timestamp(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Opens a write transaction with `BEGIN IMMEDIATE`. The write lock is
/// taken up front, so concurrent writers wait on the busy timeout instead
/// of failing the read-to-write upgrade with `SQLITE_BUSY`.
pub(crate) async fn begin_write(
    pool: &sqlx::SqlitePool,
) -> RepoResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// `SQLITE_BUSY` / `SQLITE_LOCKED` and their extended codes.
pub fn is_busy(e: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = e else {
        return false;
    };
    db.code()
        .and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}
