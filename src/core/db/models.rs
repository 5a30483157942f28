//! Database models for Inkpress
//!
//! This module defines the account entity that maps to the `users` table,
//! plus the outward projections that never carry secrets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Role
// ============================================================================

/// Coarse authorization tag carried inside session credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Derive the role from the stored admin flag
    pub fn from_admin_flag(admin: bool) -> Self {
        if admin { Role::Admin } else { Role::User }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// User Model
// ============================================================================

/// Account record as persisted by the credential store.
///
/// `confirmation_token` holds the single pending action token. The same column
/// serves email confirmation and password reset; a new request overwrites any
/// earlier token regardless of which flow issued it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    pub admin: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "first last" when a last name is present, otherwise the first name alone
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, self.last_name.as_deref())
    }

    pub fn role(&self) -> Role {
        Role::from_admin_flag(self.admin)
    }
}

pub fn full_name(first_name: &str, last_name: Option<&str>) -> String {
    match last_name {
        Some(last) if !last.is_empty() => format!("{first_name} {last}"),
        _ => first_name.to_string(),
    }
}

/// User data for creation (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub confirmation_token: Option<String>,
}

/// User data for profile updates
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    /// Only honored on admin routes
    pub admin: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.avatar.is_none()
            && self.admin.is_none()
    }
}

/// Which unique field an availability check targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Email,
    Username,
}

impl AccountField {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountField::Email => "email",
            AccountField::Username => "username",
        }
    }
}

impl std::fmt::Display for AccountField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup predicate understood by every credential store
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(Uuid),
    Username(&'a str),
    Email(&'a str),
    ConfirmationToken(&'a str),
}

impl<'a> UserLookup<'a> {
    pub fn by_field(field: AccountField, value: &'a str) -> Self {
        match field {
            AccountField::Email => UserLookup::Email(value),
            AccountField::Username => UserLookup::Username(value),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserLookup::Id(id) => user.id == *id,
            UserLookup::Username(username) => user.username == *username,
            UserLookup::Email(email) => user.email == *email,
            UserLookup::ConfirmationToken(token) => {
                user.confirmation_token.as_deref() == Some(*token)
            }
        }
    }
}

// ============================================================================
// Outward projections
// ============================================================================

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub avatar: Option<String>,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub verified: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            avatar: user.avatar.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name(),
            role: user.role(),
            verified: user.verified,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// Row of the admin user listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub username: String,
    pub avatar: Option<String>,
    pub role: Role,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        let role = user.role();
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            avatar: user.avatar,
            role,
        }
    }
}

/// Short identity summary returned by profile mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub username: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            username: user.username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            first_name: "Alice".to_string(),
            last_name: None,
            verified: false,
            confirmation_token: Some("a".repeat(64)),
            admin: false,
            avatar: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_without_last_name() {
        let user = sample_user();
        assert_eq!(user.full_name(), "Alice");
    }

    #[test]
    fn test_full_name_with_last_name() {
        let mut user = sample_user();
        user.last_name = Some("Liddell".to_string());
        assert_eq!(user.full_name(), "Alice Liddell");
    }

    #[test]
    fn test_empty_last_name_is_ignored() {
        assert_eq!(full_name("Bob", Some("")), "Bob");
    }

    #[test]
    fn test_role_from_admin_flag() {
        assert_eq!(Role::from_admin_flag(true), Role::Admin);
        assert_eq!(Role::from_admin_flag(false), Role::User);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let user = sample_user();
        let json = serde_json::to_string(&user).unwrap();

        assert!(!json.contains("password_hash"));
        assert!(!json.contains("confirmation_token"));
        assert!(!json.contains(&"a".repeat(64)));
    }

    #[test]
    fn test_user_response_projection() {
        let mut user = sample_user();
        user.admin = true;
        user.last_name = Some("Liddell".to_string());

        let response = UserResponse::from(&user);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["fullName"], "Alice Liddell");
        assert_eq!(json["role"], "admin");
        assert_eq!(json["verified"], false);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("confirmationToken").is_none());
    }

    #[test]
    fn test_lookup_matches() {
        let user = sample_user();
        let token = "a".repeat(64);

        assert!(UserLookup::Id(user.id).matches(&user));
        assert!(UserLookup::Username("alice").matches(&user));
        assert!(UserLookup::by_field(AccountField::Email, "alice@x.com").matches(&user));
        assert!(UserLookup::ConfirmationToken(&token).matches(&user));
        assert!(!UserLookup::ConfirmationToken("other").matches(&user));
    }

    #[test]
    fn test_update_user_is_empty() {
        assert!(UpdateUser::default().is_empty());
        let update: UpdateUser = serde_json::from_str(r#"{"firstName":"Al"}"#).unwrap();
        assert!(!update.is_empty());
        assert_eq!(update.first_name.as_deref(), Some("Al"));
    }
}
