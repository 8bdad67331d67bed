use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    auth::{
        generate_access_token, hash_access_token, hash_password, validate_new_password,
        verify_login, verify_password,
    },
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ok, ApiOk, AppState, LoginData, LoginRequest, MeData, OkData, Rol, Usuario},
    repo::{
        sessions,
        usuarios::{self, NuevoUsuario},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change_password", post(change_password))
}

/* ============================================================
   POST /auth/login
   ============================================================ */

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let correo = req.correo.trim();
    if correo.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("correo y contraseña son obligatorios"));
    }

    // 1) Load usuario
    let row = usuarios::find_by_correo(&state.db, correo).await?;

    // 2) Verify password, hashing even when the correo is unknown
    if !verify_login(&req.password, row.as_ref().map(|r| r.password.as_str())) {
        tracing::info!(usuario_id = row.as_ref().map(|r| r.id), "login rejected");
        return Err(ApiError::invalid_credentials());
    }
    let row = row.ok_or_else(ApiError::invalid_credentials)?;

    // 3) Create session_token
    let token = generate_access_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);
    sessions::create(
        &state.db,
        row.id,
        &hash_access_token(&token),
        req.device_name.as_deref(),
        expires_at,
    )
    .await?;

    let usuario = row.into_usuario()?;
    tracing::info!(usuario_id = usuario.id, rol = usuario.rol.as_str(), "login");

    Ok(ok(LoginData {
        token,
        expires_at,
        usuario,
    }))
}

/* ============================================================
   POST /auth/register (self-service paciente)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    #[serde(alias = "email")]
    pub correo: Option<String>,
    pub password: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} es obligatorio")))
}

/// Shared with the admin usuario endpoint.
pub(crate) fn nuevo_usuario(
    nombre: Option<String>,
    apellido: Option<String>,
    correo: Option<String>,
    password: Option<String>,
    rol: Rol,
    especialidad: Option<String>,
) -> Result<NuevoUsuario, ApiError> {
    let nombre = required(nombre, "nombre")?;
    let apellido = required(apellido, "apellido")?;
    let correo = required(correo, "correo")?;
    if !correo.contains('@') {
        return Err(ApiError::validation("correo no es válido"));
    }
    let password = password.unwrap_or_default();
    validate_new_password(&password).map_err(ApiError::validation)?;
    let password_hash = hash_password(&password).map_err(ApiError::Internal)?;

    Ok(NuevoUsuario {
        nombre,
        apellido,
        correo,
        password_hash,
        rol,
        especialidad,
    })
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<Json<ApiOk<Usuario>>, ApiError> {
    let nuevo = nuevo_usuario(
        req.nombre,
        req.apellido,
        req.correo,
        req.password,
        Rol::Paciente,
        None,
    )?;
    let usuario = usuarios::create(&state.db, nuevo).await?;
    Ok(ok(usuario))
}

/* ============================================================
   GET /auth/me, POST /auth/logout
   ============================================================ */

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let usuario = usuarios::get(&state.db, auth.usuario_id)
        .await
        .map_err(|_| ApiError::session_expired())?;

    let expires_at = sessions::expires_at(&state.db, auth.session_token_id, auth.usuario_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    Ok(ok(MeData {
        usuario,
        session_token_id: auth.session_token_id,
        expires_at,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if !sessions::revoke(&state.db, auth.session_token_id, auth.usuario_id).await? {
        return Err(ApiError::session_expired());
    }
    tracing::info!(usuario_id = auth.usuario_id, "logout");
    Ok(ok(OkData { ok: true }))
}

/* ============================================================
   POST /auth/change_password
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation(
            "old_password y new_password son obligatorios",
        ));
    }
    validate_new_password(&req.new_password).map_err(ApiError::validation)?;

    let row = usuarios::find_by_id(&state.db, auth.usuario_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    if !verify_password(&req.old_password, &row.password) {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(&req.new_password).map_err(ApiError::Internal)?;
    // other sessions are revoked; the current one stays
    usuarios::update_password(&state.db, auth.usuario_id, &new_hash, auth.session_token_id)
        .await?;

    Ok(ok(OkData { ok: true }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        models::Rol,
        routes::testing::{TestApp, PASSWORD},
    };

    #[tokio::test]
    async fn login_accepts_email_alias_and_rejects_bad_password() {
        let app = TestApp::new().await;
        app.user("ana@x.com", Rol::Paciente, None).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ANA@x.com", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["usuario"]["rol"], "paciente");
        assert!(body["data"]["usuario"].get("password").is_none());

        for (correo, password) in [("ana@x.com", "incorrecta"), ("nadie@x.com", PASSWORD)] {
            let (status, body) = app
                .call(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({ "correo": correo, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], "INVALID_CREDENTIALS");
        }
    }

    #[tokio::test]
    async fn malformed_login_body_is_400_envelope() {
        let app = TestApp::new().await;
        let (status, body) = app
            .call(Method::POST, "/api/auth/login", None, Some(json!({ "correo": 3 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn me_then_logout_invalidates_token() {
        let app = TestApp::new().await;
        let id = app.user("luis@x.com", Rol::Doctor, Some("Ortodoncia")).await;
        let token = app.login("luis@x.com").await;

        let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["usuario"]["id"], id);
        assert_eq!(body["data"]["usuario"]["especialidad"], "Ortodoncia");

        let (status, _) = app.call(Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "SESSION_EXPIRED");
    }

    #[tokio::test]
    async fn register_creates_paciente_once() {
        let app = TestApp::new().await;
        let body = json!({
            "nombre": "Ana",
            "apellido": "Pérez",
            "correo": "ana@x.com",
            "password": "suficiente",
        });
        let (status, res) = app
            .call(Method::POST, "/api/auth/register", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::OK, "{res}");
        assert_eq!(res["data"]["rol"], "paciente");

        let (status, _) = app.call(Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "nombre": "B", "apellido": "C", "correo": "b@x.com", "password": "corta" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn change_password_keeps_current_session_only() {
        let app = TestApp::new().await;
        app.user("ana@x.com", Rol::Paciente, None).await;
        let current = app.login("ana@x.com").await;
        let other = app.login("ana@x.com").await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/change_password",
                Some(&current),
                Some(json!({ "old_password": "mal", "new_password": "nueva-clave-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/change_password",
                Some(&current),
                Some(json!({ "old_password": PASSWORD, "new_password": "nueva-clave-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&current), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&other), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "correo": "ana@x.com", "password": "nueva-clave-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}
