use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserChanges};

/// Process-local store for development runs and tests.
///
/// Records are kept in insertion order; the uniqueness check and the write happen under
/// the same lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &[User], email: &str, except: Option<Uuid>) -> bool {
    users
        .iter()
        .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.iter().rev().cloned().collect())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if email_taken(&users, &new.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = changes.email.as_deref() {
            if email_taken(&users, email, Some(id)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users
            .iter()
            .position(|u| u.id == id)
            .map(|idx| users.remove(idx)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::policy::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Someone".into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = MemoryUserStore::new();
        store.insert(new_user("bob@x.com")).await.unwrap();
        let err = store.insert(new_user("BOB@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert!(store.find_by_email("Bob@X.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_rejects_email_owned_by_someone_else() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a@x.com")).await.unwrap();
        store.insert(new_user("b@x.com")).await.unwrap();

        let changes = UserChanges {
            email: Some("B@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(a.id, changes).await,
            Err(StoreError::DuplicateEmail)
        ));

        // keeping one's own address is fine
        let same = UserChanges {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        assert!(store.update(a.id, same).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryUserStore::new();
        for email in ["1@x.com", "2@x.com", "3@x.com"] {
            store.insert(new_user(email)).await.unwrap();
        }
        let emails: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, ["3@x.com", "2@x.com", "1@x.com"]);
    }

    #[tokio::test]
    async fn update_and_delete_missing_records() {
        let store = MemoryUserStore::new();
        let ghost = Uuid::new_v4();
        assert!(store.update(ghost, UserChanges::default()).await.unwrap().is_none());
        assert!(store.delete(ghost).await.unwrap().is_none());

        let u = store.insert(new_user("gone@x.com")).await.unwrap();
        assert_eq!(store.delete(u.id).await.unwrap().map(|d| d.id), Some(u.id));
        assert!(store.delete(u.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_with_same_email_admit_one() {
        let store = Arc::new(MemoryUserStore::new());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let email = if i % 2 == 0 { "race@x.com" } else { "RACE@x.com" };
                tokio::spawn(async move { store.insert(new_user(email)).await })
            })
            .collect();

        let mut ok = 0;
        for t in tasks {
            if t.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
