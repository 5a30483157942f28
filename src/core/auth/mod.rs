//! Authentication and account lifecycle
//!
//! - Password hashing and pending action tokens
//! - Session credential issuance (JWT)
//! - Registration, confirmation, login and password reset flows
//! - Request-time role checks for privileged routes

pub mod api;
pub mod guard;
pub mod jwt;
pub mod password;
pub mod service;
pub mod tokens;

pub use api::{ApiJson, AuthApiState, ErrorBody, auth_api_router};
pub use guard::{AuthUser, RoleGuard, authorize, extract_bearer_token, require_roles};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use password::{BcryptHasher, DEFAULT_BCRYPT_COST, HashError, PasswordHasher};
pub use service::{
    AuthError, AuthResponse, AuthService, ForgotPasswordRequest, LoginRequest, OkResponse,
    RegisterRequest, ResetPasswordRequest,
};
pub use tokens::generate_token;
