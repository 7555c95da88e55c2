//! User repository and service traits.
//!
//! These traits define the contract for user operations without any
//! database-specific types, allowing for different storage implementations.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::users_model::{ListUsersQuery, NewUser, User, UserPage, UserUpdate};
use crate::errors::Result;

/// Trait defining the contract for User repository operations.
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// Persists a fully built user together with its password hash.
    async fn create(&self, user: User, hashed_password: String) -> Result<User>;

    /// Overwrites the attribute fields of an existing user.
    ///
    /// Returns `DatabaseError::NotFound` when the id is unknown.
    async fn update(&self, update: UserUpdate, updated_at: NaiveDateTime) -> Result<User>;

    /// Deletes a user by its ID.
    ///
    /// Returns the number of deleted records.
    async fn delete(&self, user_id: &str) -> Result<usize>;

    /// Retrieves a user by its ID.
    fn get_by_id(&self, user_id: &str) -> Result<User>;

    /// Lists one page of users matching the query filters, oldest first.
    fn list(&self, query: &ListUsersQuery) -> Result<UserPage>;
}

/// Trait defining the contract for User service operations.
#[async_trait]
pub trait UserServiceTrait: Send + Sync {
    /// Creates a new user with validation.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Updates an existing user with validation.
    async fn update_user(&self, update: UserUpdate) -> Result<User>;

    async fn delete_user(&self, user_id: &str) -> Result<()>;

    fn get_user(&self, user_id: &str) -> Result<User>;

    fn list_users(&self, query: &ListUsersQuery) -> Result<UserPage>;

    /// Starts relaying user changes to the broker until `cancel` fires.
    ///
    /// Returns `None` when no relay is configured for this service.
    async fn start_watching_users(
        &self,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>>;
}
