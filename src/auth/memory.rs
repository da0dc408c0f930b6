use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

use super::{
    repo::UserStore,
    repo_types::{NewUser, ProfileUpdate, Role, User, UserSummary},
};

/// Principal store backed by a vector, for tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    /// Test-only backdoor for rows the public API cannot produce.
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn set_role(&self, id: Uuid, role: Role) {
        if let Some(u) = self.users.lock().unwrap().iter_mut().find(|u| u.id == id) {
            u.role = role;
        }
    }

    /// Raw row, including deactivated users and reset fields.
    pub fn raw(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn with_active<T>(&self, id: Uuid, f: impl FnOnce(&mut User) -> T) -> Option<T> {
        let mut users = self.users.lock().unwrap();
        users.iter_mut().find(|u| u.id == id && u.active).map(f)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(AppError::Conflict(
                "Duplicate field value. Please use another value!".into(),
            )
            .into());
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            photo: "default.jpg".into(),
            role: Role::User,
            password_hash: new_user.password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.with_active(id, |u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email && u.active).cloned())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| {
                u.active
                    && u.password_reset_token.as_deref() == Some(token_hash)
                    && u.password_reset_expires.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        self.with_active(id, |u| {
            u.password_hash = password_hash.to_string();
            u.password_changed_at = Some(changed_at);
            u.password_reset_token = None;
            u.password_reset_expires = None;
        });
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        reset: Option<(String, OffsetDateTime)>,
    ) -> anyhow::Result<()> {
        self.with_active(id, |u| match reset {
            Some((hash, expires)) => {
                u.password_reset_token = Some(hash);
                u.password_reset_expires = Some(expires);
            }
            None => {
                u.password_reset_token = None;
                u.password_reset_expires = None;
            }
        });
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> anyhow::Result<Option<User>> {
        Ok(self.with_active(id, |u| {
            if let Some(name) = update.name {
                u.name = name;
            }
            if let Some(email) = update.email {
                u.email = email;
            }
            if let Some(role) = update.role {
                u.role = role;
            }
            u.clone()
        }))
    }

    async fn deactivate(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.with_active(id, |u| u.active = false).is_some())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().filter(|u| u.active).cloned().collect())
    }

    async fn summaries(&self, ids: &[Uuid]) -> anyhow::Result<Vec<UserSummary>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| u.active && ids.contains(&u.id))
            .map(UserSummary::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn deactivated_users_disappear_from_default_lookups() {
        let store = MemoryUserStore::default();
        let user = store.create(new_user("a@x.com")).await.unwrap();
        assert!(store.deactivate(user.id).await.unwrap());

        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.summaries(&[user.id]).await.unwrap().is_empty());
        assert!(!store.deactivate(user.id).await.unwrap());
        assert!(store.raw(user.id).is_some());
    }

    #[tokio::test]
    async fn reset_token_lookup_respects_expiry() {
        let store = MemoryUserStore::default();
        let user = store.create(new_user("b@x.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(user.id, Some(("h".into(), now + time::Duration::minutes(10))))
            .await
            .unwrap();

        assert!(store.find_by_reset_token("h", now).await.unwrap().is_some());
        assert!(store
            .find_by_reset_token("h", now + time::Duration::minutes(11))
            .await
            .unwrap()
            .is_none());
        assert!(store.find_by_reset_token("x", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credential_writes_skip_deactivated_users() {
        let store = MemoryUserStore::default();
        let user = store.create(new_user("c@x.com")).await.unwrap();
        assert!(store.deactivate(user.id).await.unwrap());
        let now = OffsetDateTime::now_utc();

        store.set_password(user.id, "new-hash", now).await.unwrap();
        store
            .set_reset_token(user.id, Some(("h".into(), now + time::Duration::minutes(10))))
            .await
            .unwrap();

        let stored = store.raw(user.id).unwrap();
        assert_eq!(stored.password_hash, "hash");
        assert!(stored.password_changed_at.is_none());
        assert!(stored.password_reset_token.is_none());
        assert!(!stored.active);
    }
}
