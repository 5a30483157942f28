//! Auth API endpoints
//!
//! - POST /auth/login - Login and get a session credential
//! - POST /auth/register - Register an unverified account
//! - GET /auth/confirm/{token} - Confirm an email address (optional `redirect`)
//! - GET /auth/check-email/{email} - Succeeds when the email is taken
//! - GET /auth/check-username/{username} - Succeeds when the username is taken
//! - POST /auth/forgot-password - Mail a password reset link
//! - POST /auth/reset-password - Set a new password with a reset token

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::auth::service::{
    AuthError, AuthResponse, AuthService, ForgotPasswordRequest, LoginRequest, OkResponse,
    RegisterRequest, ResetPasswordRequest,
};
use crate::core::db::models::AccountField;

const INVALID_REDIRECT: &str = "redirect must be a valid URL";

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub ok: bool,
    pub status_code: u16,
    pub message: String,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        Self {
            ok: false,
            status_code: err.status_code().as_u16(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorBody::from(&self))).into_response()
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

/// JSON body whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AuthError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub redirect: Option<String>,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/confirm/{token}", get(confirm_handler))
        .route("/auth/check-email", get(check_email_handler))
        .route("/auth/check-email/{email}", get(check_email_handler))
        .route("/auth/check-username", get(check_username_handler))
        .route("/auth/check-username/{username}", get(check_username_handler))
        .route("/auth/forgot-password", post(forgot_password_handler))
        .route("/auth/reset-password", post(reset_password_handler))
        .with_state(state)
}

/// POST /auth/login
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    tracing::info!("Login attempt for username: {}", request.username);

    let response = state.auth_service.login(request).await?;

    Ok(Json(response))
}

/// POST /auth/register
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    tracing::info!("Registration attempt for username: {}", request.username);

    let response = state.auth_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /auth/confirm/{token}
/// With `?redirect=<url>` a successful confirmation answers 302 to
/// `<url>?token=<token>`
async fn confirm_handler(
    State(state): State<Arc<AuthApiState>>,
    Path(token): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Response, AuthError> {
    // Rejected before the token is consumed so the client can retry
    let location = query
        .redirect
        .filter(|r| !r.is_empty())
        .map(|redirect| {
            HeaderValue::from_str(&format!("{redirect}?token={token}"))
                .map_err(|_| AuthError::validation(INVALID_REDIRECT))
        })
        .transpose()?;

    let response = state.auth_service.confirm(&token).await?;

    match location {
        Some(location) => Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response()),
        None => Ok(Json(response).into_response()),
    }
}

/// GET /auth/check-email/{email}
async fn check_email_handler(
    State(state): State<Arc<AuthApiState>>,
    email: Option<Path<String>>,
) -> Result<Json<OkResponse>, AuthError> {
    let email = email.map(|Path(e)| e).unwrap_or_default();
    let response = state.auth_service.check(AccountField::Email, &email).await?;
    Ok(Json(response))
}

/// GET /auth/check-username/{username}
async fn check_username_handler(
    State(state): State<Arc<AuthApiState>>,
    username: Option<Path<String>>,
) -> Result<Json<OkResponse>, AuthError> {
    let username = username.map(|Path(u)| u).unwrap_or_default();
    let response = state
        .auth_service
        .check(AccountField::Username, &username)
        .await?;
    Ok(Json(response))
}

/// POST /auth/forgot-password
async fn forgot_password_handler(
    State(state): State<Arc<AuthApiState>>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    let response = state.auth_service.forgot_password(request).await?;
    Ok(Json(response))
}

/// POST /auth/reset-password
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    let response = state.auth_service.reset_password(request).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody::from(&AuthError::InvalidCredentials);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "ok": false,
                "statusCode": 400,
                "message": "Username or password incorrect"
            })
        );
    }

    #[test]
    fn test_error_response_status() {
        let response = AuthError::Conflict("User with \"email\" already exists".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AuthError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_ok_response_serialization() {
        let json = serde_json::to_string(&OkResponse::success()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }
}
