// src/routes/usuario_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::auth_routes::nuevo_usuario;
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ok, ApiOk, AppState, OkData, Rol, Usuario},
    repo::usuarios,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_usuarios).post(create_usuario))
        .route("/{usuario_id}", get(get_usuario).delete(delete_usuario))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub rol: Option<String>,
}

pub async fn list_usuarios(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<ListQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<Usuario>>>, ApiError> {
    auth.require(&[Rol::Admin])?;

    let rol = match q.rol.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Rol>()
                .map_err(|_| ApiError::validation(format!("rol no válido: {raw}")))?,
        ),
        None => None,
    };

    Ok(ok(usuarios::list(&state.db, rol).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateUsuarioRequest {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    #[serde(alias = "email")]
    pub correo: Option<String>,
    pub password: Option<String>,
    pub rol: Option<Rol>,
    pub especialidad: Option<String>,
}

pub async fn create_usuario(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<CreateUsuarioRequest>, ApiError>,
) -> Result<Json<ApiOk<Usuario>>, ApiError> {
    auth.require(&[Rol::Admin])?;

    let rol = req.rol.ok_or_else(|| ApiError::validation("rol es obligatorio"))?;
    let nuevo = nuevo_usuario(
        req.nombre,
        req.apellido,
        req.correo,
        req.password,
        rol,
        req.especialidad,
    )?;

    let usuario = usuarios::create(&state.db, nuevo).await?;
    Ok(ok(usuario))
}

pub async fn get_usuario(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(usuario_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<Usuario>>, ApiError> {
    if !auth.is_admin() && auth.usuario_id != usuario_id {
        return Err(ApiError::forbidden("Solo puede consultar su propio usuario"));
    }
    Ok(ok(usuarios::get(&state.db, usuario_id).await?))
}

pub async fn delete_usuario(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(usuario_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.require(&[Rol::Admin])?;
    if usuario_id == auth.usuario_id {
        return Err(ApiError::validation("No puede eliminar su propio usuario"));
    }
    usuarios::delete(&state.db, usuario_id).await?;
    Ok(ok(OkData { ok: true }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{models::Rol, routes::testing::TestApp};

    #[tokio::test]
    async fn admin_creates_doctor_with_especialidad() {
        let app = TestApp::new().await;
        app.user("admin@x.com", Rol::Admin, None).await;
        let admin = app.login("admin@x.com").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/usuarios",
                Some(&admin),
                Some(json!({
                    "nombre": "Luis",
                    "apellido": "Gómez",
                    "correo": "luis@x.com",
                    "password": "doctor-123",
                    "rol": "doctor",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/usuarios",
                Some(&admin),
                Some(json!({
                    "nombre": "Luis",
                    "apellido": "Gómez",
                    "correo": "luis@x.com",
                    "password": "doctor-123",
                    "rol": "doctor",
                    "especialidad": "Ortodoncia",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["especialidad"], "Ortodoncia");
        assert!(body["data"]["doctor_id"].as_i64().is_some());

        let (status, body) = app
            .call(Method::GET, "/api/usuarios?rol=doctor", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = app
            .call(Method::GET, "/api/usuarios?rol=recepcion", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_admins_see_only_themselves() {
        let app = TestApp::new().await;
        let ana = app.user("ana@x.com", Rol::Paciente, None).await;
        let beto = app.user("beto@x.com", Rol::Paciente, None).await;
        let token = app.login("ana@x.com").await;

        let (status, _) = app.call(Method::GET, "/api/usuarios", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(Method::GET, &format!("/api/usuarios/{ana}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["correo"], "ana@x.com");

        let (status, _) = app
            .call(Method::GET, &format!("/api/usuarios/{beto}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_delete_rules() {
        let app = TestApp::new().await;
        let admin_id = app.user("admin@x.com", Rol::Admin, None).await;
        let ana = app.user("ana@x.com", Rol::Paciente, None).await;
        let admin = app.login("admin@x.com").await;
        let ana_token = app.login("ana@x.com").await;

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/usuarios/{admin_id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/usuarios/{ana}");
        let (status, _) = app.call(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.call(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // sessions go with the usuario
        let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&ana_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
