//! Authentication service
//!
//! Account lifecycle over the `(verified, confirmation_token)` pair:
//! registration issues a pending token, confirmation consumes it, a forgot
//! password request replaces it and a reset consumes it again. Login issues a
//! session credential from the stored role flag.
//!
//! Store, mailer, hasher and session issuer are all injected so the flows can
//! be exercised against in-memory fakes.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::core::auth::jwt::JwtService;
use crate::core::auth::password::{PasswordHasher, hash_blocking, verify_blocking};
use crate::core::auth::tokens::generate_token;
use crate::core::db::models::{AccountField, NewUser, User, UserLookup, UserResponse};
use crate::core::db::repositories::{StoreError, UserStore};
use crate::core::mail::{MailKind, Mailer};
use crate::core::validation::{
    Validate, ValidationResult, require_non_empty, validate_email, validate_username,
};

pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";
pub const USER_NOT_FOUND: &str = "User not found";
pub const PASSWORD_NOT_CONFIRMED: &str = "Password is not confirmed";

/// Errors surfaced at the HTTP boundary
///
/// The message of every variant is safe to show to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Username or password incorrect")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation(message.into())
    }

    pub fn not_found() -> Self {
        AuthError::NotFound(USER_NOT_FOUND.to_string())
    }

    /// Pass domain store failures through, log and mask everything else
    pub fn from_store(err: StoreError, masked_message: &str) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::Conflict(err.to_string()),
            StoreError::NotFound => AuthError::not_found(),
            other => {
                tracing::error!(error = %other, "Credential store failure");
                AuthError::validation(masked_message)
            }
        }
    }

    /// Log an internal failure and return the generic client error
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        AuthError::validation(SOMETHING_WENT_WRONG)
    }
}

fn validated<T: Validate>(request: &T) -> Result<(), AuthError> {
    request.validate().into_result().map_err(AuthError::Validation)
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result
            .check(validate_username("username", &self.username))
            .check(require_non_empty("password", &self.password));
        result
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result
            .check(validate_email("email", &self.email))
            .check(require_non_empty("firstName", &self.first_name))
            .check(validate_username("username", &self.username))
            .check(require_non_empty("password", &self.password))
            .check(require_non_empty("confirmPassword", &self.confirm_password));
        result
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check(validate_email("email", &self.email));
        result
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result
            .check(require_non_empty("token", &self.token))
            .check(require_non_empty("password", &self.password))
            .check(require_non_empty(
                "passwordConfirmation",
                &self.password_confirmation,
            ));
        result
    }
}

/// Credential plus sanitized projection returned by login and register
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub ok: bool,
    pub status_code: u16,
    pub access_token: String,
    pub user: UserResponse,
}

/// Bare success indicator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const fn success() -> Self {
        Self { ok: true }
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    hasher: Arc<dyn PasswordHasher>,
    jwt: JwtService,
    /// Digest verified against when the username is unknown so both login
    /// failures cost one bcrypt comparison
    dummy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        hasher: Arc<dyn PasswordHasher>,
        jwt: JwtService,
    ) -> Self {
        Self {
            store,
            mailer,
            hasher,
            jwt,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Login with username and password
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        validated(&request)?;

        let user = self
            .store
            .find(UserLookup::Username(&request.username))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        let Some(user) = user else {
            self.burn_comparison(&request.password).await;
            return Err(AuthError::InvalidCredentials);
        };

        let matches = verify_blocking(&self.hasher, &request.password, &user.password_hash)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Stored password hash unusable");
                AuthError::InvalidCredentials
            })?;

        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::debug!(user_id = %user.id, role = %user.role(), "Login succeeded");

        self.issue(&user, StatusCode::OK)
    }

    /// Create an unverified account and send its confirmation link
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        if request.password != request.confirm_password {
            return Err(AuthError::validation(PASSWORD_NOT_CONFIRMED));
        }
        validated(&request)?;

        let token = generate_token();
        let password_hash = hash_blocking(&self.hasher, &request.password)
            .await
            .map_err(|e| AuthError::internal("Password hashing failed", e))?;

        let last_name = request.last_name.filter(|l| !l.trim().is_empty());

        let user = self
            .store
            .create(NewUser {
                email: request.email,
                username: request.username,
                password_hash,
                first_name: request.first_name,
                last_name,
                confirmation_token: Some(token.clone()),
            })
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        tracing::info!(user_id = %user.id, "Account registered");

        self.dispatch(MailKind::Confirmation, user.email.clone(), user.full_name(), token);

        self.issue(&user, StatusCode::CREATED)
    }

    /// Consume a confirmation token and mark its account verified
    ///
    /// A token that was already consumed no longer matches any account, so a
    /// second confirmation fails like an unknown token.
    pub async fn confirm(&self, token: &str) -> Result<OkResponse, AuthError> {
        let found = self
            .store
            .find(UserLookup::ConfirmationToken(token))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        if found.is_none() {
            return Err(AuthError::validation(SOMETHING_WENT_WRONG));
        }

        let updated = self
            .store
            .confirm(token)
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        if updated == 0 {
            // Consumed concurrently between lookup and update
            return Err(AuthError::validation(SOMETHING_WENT_WRONG));
        }

        tracing::info!(accounts = updated, "Email confirmed");

        Ok(OkResponse::success())
    }

    /// Replace the pending token and mail a reset link
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<OkResponse, AuthError> {
        validated(&request)?;

        let user = self
            .store
            .find(UserLookup::Email(&request.email))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
            .ok_or_else(AuthError::not_found)?;

        let token = generate_token();

        self.store
            .set_confirmation_token(&user.email, &token)
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        tracing::info!(user_id = %user.id, "Password reset requested");

        self.dispatch(MailKind::PasswordReset, user.email, String::new(), token);

        Ok(OkResponse::success())
    }

    /// Consume a pending token and replace the password
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<OkResponse, AuthError> {
        if request.password != request.password_confirmation {
            return Err(AuthError::validation(PASSWORD_NOT_CONFIRMED));
        }
        validated(&request)?;

        let user = self
            .store
            .find(UserLookup::ConfirmationToken(&request.token))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
            .ok_or_else(AuthError::not_found)?;

        let password_hash = hash_blocking(&self.hasher, &request.password)
            .await
            .map_err(|e| AuthError::internal("Password hashing failed", e))?;

        self.store
            .reset_password(user.id, &request.token, &password_hash)
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        tracing::info!(user_id = %user.id, "Password reset");

        Ok(OkResponse::success())
    }

    /// Succeeds when `value` is already taken for `field`
    pub async fn check(&self, field: AccountField, value: &str) -> Result<OkResponse, AuthError> {
        if value.is_empty() {
            return Err(AuthError::validation(format!("{field} is required")));
        }

        let cannot_check = format!("Cannot check {field}");

        self.store
            .find(UserLookup::by_field(field, value))
            .await
            .map_err(|e| AuthError::from_store(e, &cannot_check))?
            .ok_or_else(AuthError::not_found)?;

        Ok(OkResponse::success())
    }

    fn issue(&self, user: &User, status: StatusCode) -> Result<AuthResponse, AuthError> {
        let access_token = self
            .jwt
            .sign(user.id, &user.username, user.role())
            .map_err(|e| AuthError::internal("Failed to sign session credential", e))?;

        Ok(AuthResponse {
            ok: true,
            status_code: status.as_u16(),
            access_token,
            user: UserResponse::from(user),
        })
    }

    async fn burn_comparison(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| hash_blocking(&self.hasher, "inkpress-dummy-password"))
            .await;

        if let Ok(digest) = dummy {
            let _ = verify_blocking(&self.hasher, password, digest).await;
        }
    }

    /// Send mail off the request path; failures are logged, never returned
    fn dispatch(&self, kind: MailKind, email: String, full_name: String, token: String) {
        let mailer = Arc::clone(&self.mailer);

        tokio::spawn(async move {
            let result = match kind {
                MailKind::Confirmation => mailer.send_confirmation(&email, &full_name, &token).await,
                MailKind::PasswordReset => mailer.send_password_reset(&email, &token).await,
            };

            match result {
                Ok(()) => tracing::debug!(to = %email, kind = %kind, "Account mail sent"),
                Err(e) => {
                    tracing::error!(to = %email, kind = %kind, error = %e, "Failed to send account mail")
                }
            }
        });
    }
}
