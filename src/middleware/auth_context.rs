use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Rol};
use crate::repo::sessions;

/// Server-side session for the current request, resolved from the bearer
/// token. Handlers take this instead of reading identity from the body.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub usuario_id: i64,
    pub rol: Rol,
    pub session_token_id: Uuid,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.rol == Rol::Admin
    }

    pub fn require(&self, allowed: &[Rol]) -> Result<(), ApiError> {
        if allowed.contains(&self.rol) {
            Ok(())
        } else {
            Err(ApiError::forbidden("No tiene permisos para esta acción"))
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let found = sessions::lookup(&state.db, &token_hash)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            let rol = Rol::from_id(found.rol_id)
                .ok_or_else(|| ApiError::Internal(format!("unknown rol_id {}", found.rol_id)))?;

            // best-effort
            if let Err(e) = sessions::touch(&state.db, found.session_token_id).await {
                tracing::debug!(error = %e, "failed to touch session");
            }

            Ok(AuthContext {
                usuario_id: found.usuario_id,
                rol,
                session_token_id: found.session_token_id,
            })
        }
    }
}
