//! Client-side session context.
//!
//! Built once from the login response and dropped on logout; components
//! receive a `&ClientSession` instead of reading a token from storage.

use chrono::{DateTime, Utc};

use crate::models::{LoginData, Rol, Usuario};

#[derive(Debug, Clone)]
pub struct ClientSession {
    token: String,
    expires_at: DateTime<Utc>,
    usuario: Usuario,
}

impl ClientSession {
    pub fn from_login(data: LoginData) -> Self {
        Self {
            token: data.token,
            expires_at: data.expires_at,
            usuario: data.usuario,
        }
    }

    pub fn usuario(&self) -> &Usuario {
        &self.usuario
    }

    pub fn rol(&self) -> Rol {
        self.usuario.rol
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Single owner of the current session, if any.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<ClientSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, data: LoginData) -> &ClientSession {
        self.current.insert(ClientSession::from_login(data))
    }

    /// Returns the live session; an expired one is dropped on access.
    pub fn current(&mut self, now: DateTime<Utc>) -> Option<&ClientSession> {
        if self.current.as_ref().is_some_and(|s| s.is_expired(now)) {
            self.current = None;
        }
        self.current.as_ref()
    }

    /// Hands back the session so the caller can send the logout request
    /// with its token; the store is empty afterwards.
    pub fn logout(&mut self) -> Option<ClientSession> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn login_data(expires_at: DateTime<Utc>) -> LoginData {
        LoginData {
            token: "tok".into(),
            expires_at,
            usuario: Usuario {
                id: 4,
                nombre: "Ana".into(),
                apellido: "Pérez".into(),
                correo: "ana@x.com".into(),
                rol: Rol::Paciente,
                fecha_creacion: "2025-01-01T00:00:00Z".into(),
                doctor_id: None,
                especialidad: None,
            },
        }
    }

    #[test]
    fn login_then_logout_clears_store() {
        let now = Utc::now();
        let mut store = SessionStore::new();
        let s = store.login(login_data(now + Duration::hours(1)));
        assert_eq!(s.authorization(), "Bearer tok");
        assert_eq!(s.rol(), Rol::Paciente);
        assert_eq!(store.current(now).map(|s| s.usuario().id), Some(4));

        let ended = store.logout().unwrap();
        assert_eq!(ended.usuario().nombre_completo(), "Ana Pérez");
        assert!(store.current(now).is_none());
        assert!(store.logout().is_none());
    }

    #[test]
    fn expired_session_is_dropped() {
        let now = Utc::now();
        let mut store = SessionStore::new();
        store.login(login_data(now - Duration::minutes(1)));
        assert!(store.current(now).is_none());
        assert!(store.logout().is_none());
    }
}
