//! HTTP application assembly

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::core::auth::{
    AuthApiState, AuthService, JwtService, PasswordHasher, auth_api_router,
};
use crate::core::db::repositories::UserStore;
use crate::core::mail::Mailer;
use crate::core::users::{UsersApiState, UsersService, users_api_router};

/// Collaborators the services are built from
pub struct AppDeps {
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub jwt: JwtService,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

/// GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Routes for `/auth`, `/users` and `/health`, without middleware layers
pub fn app_router(deps: AppDeps) -> Router {
    let auth_service = AuthService::new(
        Arc::clone(&deps.store),
        deps.mailer,
        Arc::clone(&deps.hasher),
        deps.jwt.clone(),
    );
    let users_service = UsersService::new(deps.store, deps.hasher);

    Router::new()
        .route("/health", get(health_handler))
        .merge(auth_api_router(AuthApiState { auth_service }))
        .merge(users_api_router(UsersApiState {
            users_service,
            jwt: deps.jwt,
        }))
}

/// CORS allowlist for the configured origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(AllowOrigin::list(origins))
}

/// Full application with tracing and CORS layers
pub fn build_app(deps: AppDeps, cors_origins: &[String]) -> Router {
    app_router(deps)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}
