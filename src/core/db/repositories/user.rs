//! User repository for database operations
//!
//! Defines the [`UserStore`] seam the auth core talks to and its PostgreSQL
//! implementation. Uniqueness of username, email and pending token is left to
//! the database constraints so concurrent registrations surface as conflicts.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{AccountField, NewUser, UpdateUser, User, UserLookup};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     verified, confirmation_token, admin, avatar, created_at, updated_at";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User with \"{}\" already exists", join_fields(.0))]
    Conflict(Vec<AccountField>),

    #[error("User not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

fn join_fields(fields: &[AccountField]) -> String {
    fields
        .iter()
        .map(AccountField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Persistence operations the auth core and account management rely on.
///
/// Every call is a single-row (or single-statement) operation; atomicity and
/// timeouts are the implementation's responsibility.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, lookup: UserLookup<'_>) -> Result<Option<User>, StoreError>;

    /// Insert a new account. Fails with [`StoreError::Conflict`] naming every
    /// colliding unique field.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Mark every account holding `token` as verified and clear the token.
    /// Returns the number of accounts updated.
    async fn confirm(&self, token: &str) -> Result<u64, StoreError>;

    /// Overwrite the pending token of the account registered with `email`
    async fn set_confirmation_token(&self, email: &str, token: &str) -> Result<(), StoreError>;

    /// Replace the password hash and clear the pending token, but only while
    /// the account still holds `token`. Fails with [`StoreError::NotFound`]
    /// once the token was consumed.
    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn update(&self, id: Uuid, updates: &UpdateUser) -> Result<User, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Collect every unique field of `new_user` already taken by another account
    async fn taken_fields(&self, new_user: &NewUser) -> Result<Vec<AccountField>, StoreError> {
        let mut fields = Vec::new();

        if self.find(UserLookup::Username(&new_user.username)).await?.is_some() {
            fields.push(AccountField::Username);
        }
        if self.find(UserLookup::Email(&new_user.email)).await?.is_some() {
            fields.push(AccountField::Email);
        }

        Ok(fields)
    }
}

/// Translate a unique-constraint violation into a conflict on the matching field
fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        let field = match db_err.constraint() {
            Some("users_email_key") => Some(AccountField::Email),
            Some("users_username_key") => Some(AccountField::Username),
            _ => None,
        };
        if let Some(field) = field {
            return StoreError::Conflict(vec![field]);
        }
    }

    StoreError::DatabaseError(err)
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find(&self, lookup: UserLookup<'_>) -> Result<Option<User>, StoreError> {
        let query = match lookup {
            UserLookup::Id(_) => format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
            UserLookup::Username(_) => {
                format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1")
            }
            UserLookup::Email(_) => format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"),
            UserLookup::ConfirmationToken(_) => format!(
                "SELECT {USER_COLUMNS} FROM users WHERE confirmation_token = $1 LIMIT 1"
            ),
        };

        let query = sqlx::query_as::<_, User>(&query);
        let query = match lookup {
            UserLookup::Id(id) => query.bind(id),
            UserLookup::Username(value)
            | UserLookup::Email(value)
            | UserLookup::ConfirmationToken(value) => query.bind(value),
        };

        Ok(query.fetch_optional(&self.pool).await?)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let taken = self.taken_fields(&new_user).await?;
        if !taken.is_empty() {
            return Err(StoreError::Conflict(taken));
        }

        let query = format!(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, confirmation_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        // A concurrent insert can still win between the check and this statement
        sqlx::query_as::<_, User>(&query)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.confirmation_token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn confirm(&self, token: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE, confirmation_token = NULL
            WHERE confirmation_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn set_confirmation_token(&self, email: &str, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET confirmation_token = $2
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, confirmation_token = NULL
            WHERE id = $1 AND confirmation_token = $3
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn update(&self, id: Uuid, updates: &UpdateUser) -> Result<User, StoreError> {
        let query = format!(
            r#"
            UPDATE users
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                avatar = COALESCE($4, avatar),
                admin = COALESCE($5, admin)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&updates.first_name)
            .bind(&updates.last_name)
            .bind(&updates.avatar)
            .bind(updates.admin)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");

        Ok(sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
