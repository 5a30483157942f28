//! Users API endpoints
//!
//! Caller routes (any valid credential):
//! - GET /users/me
//! - PATCH /users/me
//! - PATCH /users/me/password
//! - DELETE /users/me
//!
//! Admin routes:
//! - GET /users
//! - PATCH /users/{id}
//! - DELETE /users/{id}

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    middleware,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::core::auth::jwt::JwtService;
use crate::core::auth::{ApiJson, AuthError, AuthUser, OkResponse, RoleGuard, require_roles};
use crate::core::db::models::{Role, UpdateUser, UserResponse};
use crate::core::users::service::{
    UpdatePasswordRequest, UpdateUserResponse, UserListResponse, UsersService,
};

#[derive(Clone, FromRef)]
pub struct UsersApiState {
    pub users_service: UsersService,
    pub jwt: JwtService,
}

pub fn users_api_router(state: UsersApiState) -> Router {
    let admin_guard = RoleGuard::new(state.jwt.clone(), &[Role::Admin]);

    let admin = Router::new()
        .route("/users", get(list_handler))
        .route("/users/{id}", patch(update_handler).delete(delete_handler))
        .route_layer(middleware::from_fn_with_state(admin_guard, require_roles));

    Router::new()
        .route(
            "/users/me",
            get(me_handler).patch(update_me_handler).delete(delete_me_handler),
        )
        .route("/users/me/password", patch(update_password_handler))
        .merge(admin)
        .with_state(state)
}

fn parse_id(id: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(id).map_err(|_| AuthError::not_found())
}

/// GET /users/me
async fn me_handler(
    State(service): State<UsersService>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(service.get_me(claims.id).await?))
}

/// PATCH /users/me
/// The admin flag is ignored here
async fn update_me_handler(
    State(service): State<UsersService>,
    AuthUser(claims): AuthUser,
    ApiJson(mut updates): ApiJson<UpdateUser>,
) -> Result<Json<UpdateUserResponse>, AuthError> {
    updates.admin = None;
    Ok(Json(service.update(claims.id, &updates).await?))
}

/// PATCH /users/me/password
async fn update_password_handler(
    State(service): State<UsersService>,
    AuthUser(claims): AuthUser,
    ApiJson(request): ApiJson<UpdatePasswordRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    service.update_password(claims.id, request).await?;
    Ok(Json(OkResponse::success()))
}

/// DELETE /users/me
async fn delete_me_handler(
    State(service): State<UsersService>,
    AuthUser(claims): AuthUser,
) -> Result<Json<OkResponse>, AuthError> {
    service.delete(claims.id).await?;
    Ok(Json(OkResponse::success()))
}

/// GET /users
async fn list_handler(
    State(service): State<UsersService>,
) -> Result<Json<UserListResponse>, AuthError> {
    Ok(Json(service.list().await?))
}

/// PATCH /users/{id}
async fn update_handler(
    State(service): State<UsersService>,
    Path(id): Path<String>,
    ApiJson(updates): ApiJson<UpdateUser>,
) -> Result<Json<UpdateUserResponse>, AuthError> {
    let id = parse_id(&id)?;
    Ok(Json(service.update(id, &updates).await?))
}

/// DELETE /users/{id}
async fn delete_handler(
    State(service): State<UsersService>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AuthError> {
    let id = parse_id(&id)?;
    service.delete(id).await?;
    Ok(Json(OkResponse::success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_id("42"), Err(AuthError::not_found()));
    }
}
