//! Account management for authenticated callers and administrators

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::password::{PasswordHasher, hash_blocking, verify_blocking};
use crate::core::auth::service::{AuthError, SOMETHING_WENT_WRONG};
use crate::core::db::models::{UpdateUser, UserListItem, UserLookup, UserResponse, UserSummary};
use crate::core::db::repositories::UserStore;
use crate::core::validation::{Validate, ValidationResult, require_non_empty};

pub const PASSWORD_INCORRECT: &str = "Password is incorrect";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    /// Current password
    pub password: String,
    pub new_password: String,
}

impl Validate for UpdatePasswordRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result
            .check(require_non_empty("password", &self.password))
            .check(require_non_empty("newPassword", &self.new_password));
        result
    }
}

impl Validate for UpdateUser {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(first_name) = &self.first_name {
            result.check(require_non_empty("firstName", first_name));
        }
        result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserResponse {
    pub ok: bool,
    pub result: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserListItem>,
    pub total: i64,
}

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UsersService {
    pub fn new(store: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    pub async fn get_me(&self, id: Uuid) -> Result<UserResponse, AuthError> {
        let user = self
            .store
            .find(UserLookup::Id(id))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
            .ok_or_else(AuthError::not_found)?;

        Ok(UserResponse::from(user))
    }

    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateUser,
    ) -> Result<UpdateUserResponse, AuthError> {
        updates
            .validate()
            .into_result()
            .map_err(AuthError::Validation)?;

        let user = if updates.is_empty() {
            self.store
                .find(UserLookup::Id(id))
                .await
                .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
                .ok_or_else(AuthError::not_found)?
        } else {
            self.store
                .update(id, updates)
                .await
                .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
        };

        if let Some(admin) = updates.admin {
            tracing::info!(user_id = %id, admin, "Admin flag changed, effective from next login");
        }

        Ok(UpdateUserResponse {
            ok: true,
            result: UserSummary::from(user),
        })
    }

    /// Change the password after checking the current one
    pub async fn update_password(
        &self,
        id: Uuid,
        request: UpdatePasswordRequest,
    ) -> Result<(), AuthError> {
        request
            .validate()
            .into_result()
            .map_err(AuthError::Validation)?;

        let user = self
            .store
            .find(UserLookup::Id(id))
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?
            .ok_or_else(AuthError::not_found)?;

        let matches = verify_blocking(&self.hasher, &request.password, &user.password_hash)
            .await
            .map_err(|e| AuthError::internal("Password verification failed", e))?;

        if !matches {
            return Err(AuthError::validation(PASSWORD_INCORRECT));
        }

        let password_hash = hash_blocking(&self.hasher, &request.new_password)
            .await
            .map_err(|e| AuthError::internal("Password hashing failed", e))?;

        self.store
            .update_password(id, &password_hash)
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        tracing::info!(user_id = %id, "Password changed");

        Ok(())
    }

    pub async fn list(&self) -> Result<UserListResponse, AuthError> {
        let users = self
            .store
            .list()
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;
        let total = self
            .store
            .count()
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        Ok(UserListResponse {
            users: users.into_iter().map(UserListItem::from).collect(),
            total,
        })
    }

    /// Delete an account; authored content is removed by its own store
    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        let deleted = self
            .store
            .delete(id)
            .await
            .map_err(|e| AuthError::from_store(e, SOMETHING_WENT_WRONG))?;

        if !deleted {
            return Err(AuthError::not_found());
        }

        tracing::info!(user_id = %id, "Account deleted");

        Ok(())
    }
}
