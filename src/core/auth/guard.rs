//! Request-time authorization
//!
//! The role is read from the verified credential claims, not from the store.
//! A role change therefore only takes effect once the account logs in again.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::core::auth::jwt::{Claims, JwtService};
use crate::core::auth::service::AuthError;
use crate::core::db::models::Role;

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthorized)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    Ok(token)
}

/// Decode the bearer credential; every failure collapses to `Unauthorized`
pub fn authenticate(jwt: &JwtService, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let token = extract_bearer_token(headers)?;

    jwt.decode(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer credential");
        AuthError::Unauthorized
    })
}

/// Pure role check over decoded claims
pub fn authorize(allowed: &[Role], claims: &Claims) -> Result<(), AuthError> {
    if allowed.is_empty() || allowed.contains(&claims.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %claims.id, role = %claims.role, "Role not permitted");
        Err(AuthError::Unauthorized)
    }
}

/// Middleware state naming the roles a route group accepts
#[derive(Clone)]
pub struct RoleGuard {
    jwt: JwtService,
    allowed: Vec<Role>,
}

impl RoleGuard {
    pub fn new(jwt: JwtService, allowed: &[Role]) -> Self {
        Self {
            jwt,
            allowed: allowed.to_vec(),
        }
    }

    /// Checks the request headers against this guard
    ///
    /// Returns `Ok(None)` when no role is required; no credential is needed then.
    pub fn check(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        if self.allowed.is_empty() {
            return Ok(None);
        }

        let claims = authenticate(&self.jwt, headers)?;
        authorize(&self.allowed, &claims)?;
        Ok(Some(claims))
    }
}

/// Use with `axum::middleware::from_fn_with_state(RoleGuard::new(..), require_roles)`
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(claims) = guard.check(request.headers())? {
        request.extensions_mut().insert(claims);
    }

    Ok(next.run(request).await)
}

/// Authenticated caller
///
/// Reuses claims already verified by [`require_roles`], otherwise decodes the
/// bearer header itself.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(AuthUser(claims.clone()));
        }

        let jwt = JwtService::from_ref(state);
        authenticate(&jwt, &parts.headers).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::jwt::JwtConfig;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn jwt() -> JwtService {
        JwtService::new(JwtConfig::new("guard-test-secret"))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn claims(role: Role) -> Claims {
        Claims {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role,
            iat: 0,
            exp: 0,
            iss: "inkpress".to_string(),
        }
    }

    #[test]
    fn test_extract_bearer_token_valid() {
        let headers = bearer("my_token_123");
        assert_eq!(extract_bearer_token(&headers).unwrap(), "my_token_123");
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_extract_bearer_token_invalid_format() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic base64credentials"),
        );
        assert_eq!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_authorize_role_membership() {
        assert!(authorize(&[Role::Admin], &claims(Role::Admin)).is_ok());
        assert!(authorize(&[Role::User, Role::Admin], &claims(Role::User)).is_ok());
        assert!(authorize(&[], &claims(Role::User)).is_ok());
        assert_eq!(
            authorize(&[Role::Admin], &claims(Role::User)),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_guard_without_roles_needs_no_credential() {
        let guard = RoleGuard::new(jwt(), &[]);
        assert_eq!(guard.check(&HeaderMap::new()), Ok(None));
    }

    #[test]
    fn test_guard_requires_credential_when_roles_declared() {
        let guard = RoleGuard::new(jwt(), &[Role::Admin]);
        assert_eq!(
            guard.check(&HeaderMap::new()),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_guard_verifies_signature() {
        let guard = RoleGuard::new(jwt(), &[Role::Admin]);
        let forged = JwtService::new(JwtConfig::new("attacker-secret"))
            .sign(Uuid::new_v4(), "mallory", Role::Admin)
            .unwrap();

        assert_eq!(guard.check(&bearer(&forged)), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_guard_rejects_expired_credential() {
        let expired = JwtService::new(JwtConfig::new("guard-test-secret").expires_in(-60))
            .sign(Uuid::new_v4(), "alice", Role::Admin)
            .unwrap();
        let guard = RoleGuard::new(jwt(), &[Role::Admin]);

        assert_eq!(guard.check(&bearer(&expired)), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_guard_admits_matching_role() {
        let jwt = jwt();
        let id = Uuid::new_v4();
        let token = jwt.sign(id, "root", Role::Admin).unwrap();
        let guard = RoleGuard::new(jwt, &[Role::Admin]);

        let claims = guard.check(&bearer(&token)).unwrap().unwrap();
        assert_eq!(claims.id, id);
    }

    #[test]
    fn test_guard_rejects_insufficient_role() {
        let jwt = jwt();
        let token = jwt.sign(Uuid::new_v4(), "alice", Role::User).unwrap();
        let guard = RoleGuard::new(jwt, &[Role::Admin]);

        assert_eq!(guard.check(&bearer(&token)), Err(AuthError::Unauthorized));
    }
}
