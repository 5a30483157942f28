//! In-memory credential store
//!
//! Used when no `DATABASE_URL` is configured and by the HTTP tests. A single
//! mutex guards the whole table so uniqueness checks and inserts are atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::user::{StoreError, UserStore};
use crate::core::db::models::{AccountField, NewUser, UpdateUser, User, UserLookup};

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<Vec<User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Unavailable("user table lock poisoned".to_string()))
    }

    fn with_user<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut User) -> T,
    ) -> Result<T, StoreError> {
        let mut users = self.lock()?;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;

        user.updated_at = Utc::now();
        Ok(apply(user))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, lookup: UserLookup<'_>) -> Result<Option<User>, StoreError> {
        let users = self.lock()?;
        Ok(users.iter().find(|u| lookup.matches(u)).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.lock()?;

        let mut taken = Vec::new();
        if users.iter().any(|u| u.username == new_user.username) {
            taken.push(AccountField::Username);
        }
        if users.iter().any(|u| u.email == new_user.email) {
            taken.push(AccountField::Email);
        }
        if !taken.is_empty() {
            return Err(StoreError::Conflict(taken));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            verified: false,
            confirmation_token: new_user.confirmation_token,
            admin: false,
            avatar: None,
            created_at: now,
            updated_at: now,
        };

        users.push(user.clone());
        Ok(user)
    }

    async fn confirm(&self, token: &str) -> Result<u64, StoreError> {
        let mut users = self.lock()?;
        let mut updated = 0;

        for user in users
            .iter_mut()
            .filter(|u| u.confirmation_token.as_deref() == Some(token))
        {
            user.verified = true;
            user.confirmation_token = None;
            user.updated_at = Utc::now();
            updated += 1;
        }

        Ok(updated)
    }

    async fn set_confirmation_token(&self, email: &str, token: &str) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        let user = users
            .iter_mut()
            .find(|u| u.email == email)
            .ok_or(StoreError::NotFound)?;

        user.confirmation_token = Some(token.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        let user = users
            .iter_mut()
            .find(|u| u.id == id && u.confirmation_token.as_deref() == Some(token))
            .ok_or(StoreError::NotFound)?;

        user.password_hash = password_hash.to_string();
        user.confirmation_token = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.with_user(id, |user| user.password_hash = password_hash.to_string())
    }

    async fn update(&self, id: Uuid, updates: &UpdateUser) -> Result<User, StoreError> {
        self.with_user(id, |user| {
            if let Some(first_name) = &updates.first_name {
                user.first_name = first_name.clone();
            }
            if let Some(last_name) = &updates.last_name {
                user.last_name = Some(last_name.clone());
            }
            if let Some(avatar) = &updates.avatar {
                user.avatar = Some(avatar.clone());
            }
            if let Some(admin) = updates.admin {
                user.admin = admin;
            }
            user.clone()
        })
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.lock()?;
        let mut listed = users.clone();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.lock()?.len() as i64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.lock()?;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, token: Option<&str>) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            first_name: "Test".to_string(),
            last_name: None,
            confirmation_token: token.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_reports_every_colliding_field() {
        let store = InMemoryUserStore::new();
        store
            .create(new_user("alice", "alice@x.com", None))
            .await
            .unwrap();

        let err = store
            .create(new_user("alice", "alice@x.com", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(ref fields)
                if fields == &[AccountField::Username, AccountField::Email]
        ));

        let err = store
            .create(new_user("alice", "other@x.com", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(ref fields) if fields == &[AccountField::Username]
        ));
    }

    #[tokio::test]
    async fn test_confirm_clears_token() {
        let store = InMemoryUserStore::new();
        let user = store
            .create(new_user("bob", "bob@x.com", Some("tok")))
            .await
            .unwrap();

        assert_eq!(store.confirm("tok").await.unwrap(), 1);
        assert_eq!(store.confirm("tok").await.unwrap(), 0);

        let user = store.find(UserLookup::Id(user.id)).await.unwrap().unwrap();
        assert!(user.verified);
        assert!(user.confirmation_token.is_none());
    }

    #[tokio::test]
    async fn test_set_token_overwrites_previous() {
        let store = InMemoryUserStore::new();
        store
            .create(new_user("carol", "carol@x.com", Some("first")))
            .await
            .unwrap();

        store
            .set_confirmation_token("carol@x.com", "second")
            .await
            .unwrap();

        assert!(
            store
                .find(UserLookup::ConfirmationToken("first"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .find(UserLookup::ConfirmationToken("second"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_reset_password_requires_current_token() {
        let store = InMemoryUserStore::new();
        let user = store
            .create(new_user("dave", "dave@x.com", Some("reset")))
            .await
            .unwrap();

        assert!(matches!(
            store.reset_password(user.id, "other", "$2b$04$x").await,
            Err(StoreError::NotFound)
        ));

        store.reset_password(user.id, "reset", "$2b$04$new").await.unwrap();
        assert!(matches!(
            store.reset_password(user.id, "reset", "$2b$04$again").await,
            Err(StoreError::NotFound)
        ));

        let user = store.find(UserLookup::Id(user.id)).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "$2b$04$new");
        assert!(user.confirmation_token.is_none());
    }

    #[tokio::test]
    async fn test_set_token_unknown_email() {
        let store = InMemoryUserStore::new();
        let result = store.set_confirmation_token("nobody@x.com", "t").await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryUserStore::new();
        let user = store
            .create(new_user("dave", "dave@x.com", None))
            .await
            .unwrap();

        let updates = UpdateUser {
            last_name: Some("Grohl".to_string()),
            admin: Some(true),
            ..Default::default()
        };
        let updated = store.update(user.id, &updates).await.unwrap();
        assert_eq!(updated.full_name(), "Test Grohl");
        assert!(updated.admin);

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.delete(user.id).await.unwrap());
        assert!(!store.delete(user.id).await.unwrap());
        assert!(matches!(
            store.update(user.id, &updates).await,
            Err(StoreError::NotFound)
        ));
    }
}
