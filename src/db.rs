use std::{str::FromStr, time::Duration};

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    auth::hash_password,
    models::Rol,
    repo::usuarios::{self, NuevoUsuario},
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens (creating if needed) the SQLite file with foreign keys enforced on
/// every pooled connection, then applies pending migrations.
pub async fn connect_sqlite(database_url: &str) -> anyhow::Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    MIGRATOR.run(&pool).await?;
    tracing::info!(database_url, "database ready");
    Ok(pool)
}

/// Creates the first admin when the configured correo is not taken yet.
pub async fn bootstrap_admin(pool: &SqlitePool, correo: &str, password: &str) -> anyhow::Result<()> {
    if usuarios::find_by_correo(pool, correo).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(password).map_err(anyhow::Error::msg)?;
    let admin = usuarios::create(
        pool,
        NuevoUsuario {
            nombre: "Administrador".into(),
            apellido: "ortho&mas".into(),
            correo: correo.to_string(),
            password_hash,
            rol: Rol::Admin,
            especialidad: None,
        },
    )
    .await?;

    tracing::info!(usuario_id = admin.id, correo, "bootstrap admin created");
    Ok(())
}
