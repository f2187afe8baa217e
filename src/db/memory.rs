use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::db::models::User;
use crate::error::DatabaseError;

/// Process-local user store with the same uniqueness rules as the users table.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool, DatabaseError> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.is_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
