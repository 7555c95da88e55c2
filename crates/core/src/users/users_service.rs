use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::users_model::{now_millis, ListUsersQuery, NewUser, User, UserPage, UserUpdate};
use super::users_traits::{UserRepositoryTrait, UserServiceTrait};
use crate::errors::{DatabaseError, Result};
use crate::events::{dispatch_user_events, UserProducerTrait, UserWatcherTrait};

/// Watcher and producer pair that carries user changes to the broker.
#[derive(Clone)]
struct UserRelay {
    watcher: Arc<dyn UserWatcherTrait>,
    producer: Arc<dyn UserProducerTrait>,
}

/// Service for managing users and relaying their changes.
pub struct UserService {
    repository: Arc<dyn UserRepositoryTrait>,
    relay: Option<UserRelay>,
}

impl UserService {
    /// Creates a new UserService without a change relay.
    pub fn new(repository: Arc<dyn UserRepositoryTrait>) -> Self {
        Self {
            repository,
            relay: None,
        }
    }

    /// Attaches the watcher and producer used by `start_watching_users`.
    pub fn with_relay(
        mut self,
        watcher: Arc<dyn UserWatcherTrait>,
        producer: Arc<dyn UserProducerTrait>,
    ) -> Self {
        self.relay = Some(UserRelay { watcher, producer });
        self
    }

    pub fn has_relay(&self) -> bool {
        self.relay.is_some()
    }
}

#[async_trait::async_trait]
impl UserServiceTrait for UserService {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        new_user.validate()?;
        let (user, hashed_password) = new_user.into_user(now_millis());
        debug!("Creating user {}", user.id);
        self.repository.create(user, hashed_password).await
    }

    async fn update_user(&self, update: UserUpdate) -> Result<User> {
        update.validate()?;
        self.repository.update(update, now_millis()).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let deleted = self.repository.delete(user_id).await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound(format!("User '{}'", user_id)).into());
        }
        Ok(())
    }

    fn get_user(&self, user_id: &str) -> Result<User> {
        self.repository.get_by_id(user_id)
    }

    fn list_users(&self, query: &ListUsersQuery) -> Result<UserPage> {
        query.validate()?;
        self.repository.list(query)
    }

    async fn start_watching_users(
        &self,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>> {
        let Some(relay) = self.relay.clone() else {
            warn!("User change relay is not configured; not watching users");
            return Ok(None);
        };

        let events = relay.watcher.watch_users(cancel).await?;
        info!("Watching user changes");

        let handle = tokio::spawn(async move {
            dispatch_user_events(events, relay.producer.as_ref()).await;
        });
        Ok(Some(handle))
    }
}
