use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub slot_minutes: u32,
    /// Optional first admin, created at startup when the correo is free.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://orthomas.db".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let slot_minutes = env::var("SLOT_MINUTES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|m| (5..=240).contains(m))
            .unwrap_or(30);

        let admin_email = env::var("ADMIN_EMAIL").ok().filter(|s| !s.trim().is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());
        if admin_email.is_some() != admin_password.is_some() {
            anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together");
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            slot_minutes,
            admin_email,
            admin_password,
        })
    }
}
