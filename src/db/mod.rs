//! Database module for MiniChat server
//!
//! User persistence behind the `UserStore` trait, with a Postgres
//! implementation and an in-memory one for tests and local runs.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::password::verify_password;
use crate::error::DatabaseError;

pub use memory::InMemoryUserStore;
pub use models::User;
pub use operations::DbOperations;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Fails with `DatabaseError::Duplicate` when the email is already registered.
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError>;

    /// Returns `false` when no such user exists.
    async fn mark_verified(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = self.find_user_by_email(email).await?;
        Ok(user.filter(|user| verify_password(password, &user.password_hash)))
    }
}
