//! JWT utilities for session credential issuance and decoding
//!
//! Session credentials are HS256 tokens signed with a single process-wide
//! secret. They are never persisted and there is no revocation list: expiry is
//! the only way a credential stops being valid.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::db::models::Role;

/// Default credential lifetime (7 days)
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 7 * 24 * 60 * 60;

const DEFAULT_ISSUER: &str = "inkpress";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Credential lifetime in seconds
    pub expires_in_secs: i64,
    /// Token issuer
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in_secs: DEFAULT_EXPIRES_IN_SECS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Create config from `JWT_SECRET` and `JWT_EXPIRES_IN`
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret)?;

        let expires_in_secs = match std::env::var("JWT_EXPIRES_IN") {
            Ok(value) => parse_expires_in(&value)?,
            Err(_) => DEFAULT_EXPIRES_IN_SECS,
        };

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());

        Ok(Self {
            secret,
            expires_in_secs,
            issuer,
        })
    }

    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_in_secs = secs;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Parse a lifetime such as `3600`, `90s`, `15m`, `12h` or `7d` into seconds
pub fn parse_expires_in(value: &str) -> Result<i64, JwtError> {
    let value = value.trim();
    let invalid = || JwtError::InvalidExpiry(value.to_string());

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 60 * 60),
        Some((idx, 'd')) => (&value[..idx], 24 * 60 * 60),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    amount.checked_mul(multiplier).ok_or_else(invalid)
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("Invalid JWT_EXPIRES_IN value: {0}")]
    InvalidExpiry(String),

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                JwtError::InvalidSignature
            }
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Claims embedded in every session credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub id: Uuid,
    pub username: String,
    /// Role at issuance time; not refreshed until the next login
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

/// Session issuer: signs and decodes bearer credentials
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn from_env() -> Result<Self, JwtError> {
        let config = JwtConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Sign a credential for the given identity
    pub fn sign(&self, id: Uuid, username: &str, role: Role) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.expires_in_secs);

        let claims = Claims {
            id,
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Verify signature, issuer and expiry, then return the claims
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Strict expiry: no grace period
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer_for_tests() -> JwtService {
        JwtService::new(JwtConfig::new("test_secret_key_for_testing_only_32bytes!"))
    }

    #[test]
    fn test_config_defaults() {
        let config = JwtConfig::new("my_secret");

        assert_eq!(config.secret, "my_secret");
        assert_eq!(config.expires_in_secs, DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(config.issuer, "inkpress");
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let debug = format!("{:?}", JwtConfig::new("super-secret"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in("3600").unwrap(), 3600);
        assert_eq!(parse_expires_in("90s").unwrap(), 90);
        assert_eq!(parse_expires_in("15m").unwrap(), 900);
        assert_eq!(parse_expires_in("12h").unwrap(), 43_200);
        assert_eq!(parse_expires_in("7d").unwrap(), DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(parse_expires_in(" 1d ").unwrap(), 86_400);
    }

    #[test]
    fn test_parse_expires_in_rejects_garbage() {
        for value in ["", "d", "-5m", "0", "ten", "5w", "1.5h"] {
            assert!(
                matches!(parse_expires_in(value), Err(JwtError::InvalidExpiry(_))),
                "expected {value:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_sign_and_decode() {
        let service = issuer_for_tests();
        let id = Uuid::new_v4();

        let token = service.sign(id, "alice", Role::User).unwrap();
        let claims = service.decode(&token).unwrap();

        assert_eq!(claims.id, id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn test_admin_role_round_trips() {
        let service = issuer_for_tests();
        let token = service.sign(Uuid::new_v4(), "root", Role::Admin).unwrap();
        assert_eq!(service.decode(&token).unwrap().role, Role::Admin);
    }

    #[test]
    fn test_decode_malformed_token() {
        let service = issuer_for_tests();
        let result = service.decode("invalid.token.here");
        assert!(matches!(result, Err(JwtError::Malformed(_))));
    }

    #[test]
    fn test_decode_wrong_secret() {
        let signer = JwtService::new(JwtConfig::new("secret_one"));
        let verifier = JwtService::new(JwtConfig::new("secret_two"));

        let token = signer.sign(Uuid::new_v4(), "alice", Role::User).unwrap();

        let result = verifier.decode(&token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_negative_lifetime_is_expired() {
        let service = JwtService::new(JwtConfig::new("test_secret").expires_in(-60));
        let token = service.sign(Uuid::new_v4(), "alice", Role::User).unwrap();

        let result = service.decode(&token);
        assert!(
            matches!(result, Err(JwtError::Expired)),
            "negative lifetime should decode as Expired, got {:?}",
            result
        );
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issuer_a = JwtService::new(JwtConfig::new("shared").issuer("a"));
        let issuer_b = JwtService::new(JwtConfig::new("shared").issuer("b"));

        let token = issuer_a.sign(Uuid::new_v4(), "alice", Role::User).unwrap();
        assert!(issuer_b.decode(&token).is_err());
    }

    #[test]
    fn test_jwt_error_display() {
        assert_eq!(
            JwtError::MissingSecret.to_string(),
            "JWT_SECRET environment variable not set"
        );
        assert_eq!(JwtError::Expired.to_string(), "Token expired");
    }
}
