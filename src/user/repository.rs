//! Port between user handling and persistence.

use async_trait::async_trait;

use crate::user::{NewUser, User};

/// Errors raised by a [`UserRepository`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with the same email is already stored.
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every stored user, in the store's natural order.
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    /// Find a user using its `email` field.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user unless its email is already taken.
    ///
    /// Must be atomic: when two calls race on the same email, exactly one
    /// of them succeeds and the other returns [`StoreError::DuplicateEmail`].
    async fn create(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Check the store can be reached.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
