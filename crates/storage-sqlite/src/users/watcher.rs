//! Feed watcher turning `user_changes` rows into domain events.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::db::{DbPool, WriteHandle};
use userfeed_core::errors::Result;
use userfeed_core::events::{DomainEvent, UserEventStream, UserWatcherTrait, HANDOFF_CAPACITY};

use super::change_stream::{ChangeStreamOptions, UserChangeStream};

/// Watches the SQLite change feed for user mutations.
///
/// Each call to `watch_users` opens its own cursor at the feed's current end;
/// there is no checkpoint to resume from.
pub struct UserChangeStreamWatcher {
    pool: Arc<DbPool>,
    writer: Option<WriteHandle>,
    options: ChangeStreamOptions,
}

impl UserChangeStreamWatcher {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, options: ChangeStreamOptions) -> Self {
        Self {
            pool,
            writer: Some(writer),
            options,
        }
    }

    /// Watcher that discovers changes by polling only.
    pub fn polling(pool: Arc<DbPool>, options: ChangeStreamOptions) -> Self {
        Self {
            pool,
            writer: None,
            options,
        }
    }
}

#[async_trait]
impl UserWatcherTrait for UserChangeStreamWatcher {
    async fn watch_users(&self, cancel: CancellationToken) -> Result<UserEventStream> {
        let commits = self.writer.as_ref().map(WriteHandle::subscribe_commits);
        let stream = UserChangeStream::open(self.pool.clone(), self.options.clone(), commits).await?;
        info!("User change stream opened at position {}", stream.position());

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        tokio::spawn(stream_user_changes(stream, tx, cancel));
        Ok(rx)
    }
}

/// Reads the cursor until cancellation or a cursor failure, pushing one
/// event per change record. Dropping `tx` on return closes the stream.
async fn stream_user_changes(
    mut stream: UserChangeStream,
    tx: mpsc::Sender<DomainEvent>,
    cancel: CancellationToken,
) {
    loop {
        let record = match stream.next(&cancel).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("User change stream cancelled");
                break;
            }
            Err(e) => {
                error!("User change stream failed, stopping watcher: {}", e);
                break;
            }
        };

        let event = record.to_domain_event();
        if event.is_anonymous() {
            warn!(
                "User change {} ({}) has no decodable user identity",
                record.seq, record.operation_type
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("User change stream cancelled");
                break;
            }
            sent = tx.send(event) => {
                if sent.is_err() {
                    debug!("User event consumer went away, stopping watcher");
                    break;
                }
            }
        }
    }

    stream.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, get_connection, run_migrations, spawn_writer};
    use crate::users::UserRepository;
    use chrono::NaiveDate;
    use diesel::RunQueryDsl;
    use std::time::Duration;
    use tempfile::tempdir;
    use userfeed_core::events::OperationType;
    use userfeed_core::users::{User, UserRepositoryTrait, UserUpdate};

    const WAIT: Duration = Duration::from_secs(5);

    struct Fixture {
        pool: Arc<DbPool>,
        repository: UserRepository,
        watcher: UserChangeStreamWatcher,
        _temp_dir: tempfile::TempDir,
    }

    fn create_fixture() -> Fixture {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        let options = ChangeStreamOptions {
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        };
        Fixture {
            repository: UserRepository::new(pool.clone(), writer.clone()),
            watcher: UserChangeStreamWatcher::new(pool.clone(), writer, options),
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn ann(id: &str) -> User {
        let now = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, 250)
            .unwrap();
        User {
            id: id.to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            email: "ann@example.com".to_string(),
            country: "IT".to_string(),
            nickname: "annie".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn insert_raw_change(pool: &DbPool, op: &str, after: Option<&str>, before: Option<&str>) {
        let quote = |v: Option<&str>| v.map_or("NULL".to_string(), |s| format!("'{}'", s));
        let mut conn = get_connection(pool).expect("Failed to get connection");
        diesel::sql_query(format!(
            "INSERT INTO user_changes (operation_type, document_key, full_document, full_document_before_change) \
             VALUES ('{}', 'raw', {}, {})",
            op,
            quote(after),
            quote(before)
        ))
        .execute(&mut conn)
        .expect("Failed to insert change");
    }

    async fn next_event(events: &mut UserEventStream) -> DomainEvent {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Event stream closed")
    }

    #[tokio::test]
    async fn test_insert_update_delete_events() {
        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        let created = fx.repository.create(ann("u1"), "hash".to_string()).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Create);
        assert_eq!(event.user_id, "u1");
        assert!(event.before_change.is_none());
        assert_eq!(event.after_change.as_ref(), Some(&created));

        let update = UserUpdate {
            id: "u1".to_string(),
            first_name: "Anna".to_string(),
            last_name: created.last_name.clone(),
            email: created.email.clone(),
            country: created.country.clone(),
            nickname: created.nickname.clone(),
        };
        let updated_at = created.updated_at + chrono::Duration::seconds(1);
        fx.repository.update(update, updated_at).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Update);
        assert_eq!(event.before_change.as_ref().unwrap().first_name, "Ann");
        assert_eq!(event.after_change.as_ref().unwrap().first_name, "Anna");
        assert_eq!(event.after_change.as_ref().unwrap().updated_at, updated_at);

        fx.repository.delete("u1").await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Delete);
        assert!(event.after_change.is_none());
        assert_eq!(event.before_change.as_ref().unwrap().id, "u1");

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_events_never_carry_password() {
        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        fx.repository
            .create(ann("u1"), "super-secret-hash".to_string())
            .await
            .unwrap();
        let event = next_event(&mut events).await;
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("super-secret-hash"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_starts_at_current_end_of_feed() {
        let fx = create_fixture();
        fx.repository.create(ann("old"), "hash".to_string()).await.unwrap();

        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();
        fx.repository.create(ann("new"), "hash".to_string()).await.unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.user_id, "new");

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_tag_and_broken_image_do_not_stop_watcher() {
        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        let doc = r#"{"id":"u9","firstName":"Ann","lastName":"Lee","email":"ann@example.com","country":"IT","nickname":"","createdAt":"2024-05-01 10:00:00","updatedAt":"2024-05-01 10:00:00"}"#;
        // Raw rows bypass the writer, so these are found by polling.
        insert_raw_change(&fx.pool, "replace", Some(doc), None);
        insert_raw_change(&fx.pool, "update", Some("{broken"), Some(doc));
        insert_raw_change(&fx.pool, "update", Some("{broken"), None);

        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Unspecified);
        assert_eq!(event.after_change.as_ref().unwrap().id, "u9");

        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Update);
        assert!(event.after_change.is_none());
        assert_eq!(event.user_id, "u9");

        let event = next_event(&mut events).await;
        assert!(event.is_anonymous());

        fx.repository.create(ann("u1"), "hash".to_string()).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.operation_type, OperationType::Create);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_changes_closes_stream() {
        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        cancel.cancel();
        let closed = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("Stream did not close after cancellation");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_consumer_is_slow_closes_stream() {
        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        for i in 0..4 {
            fx.repository
                .create(ann(&format!("u{}", i)), "hash".to_string())
                .await
                .unwrap();
        }
        // Let the watcher fill the handoff slot and block on the next push.
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let mut received = 0;
        loop {
            match tokio::time::timeout(WAIT, events.recv()).await {
                Ok(Some(_)) => received += 1,
                Ok(None) => break,
                Err(_) => panic!("Stream did not close after cancellation"),
            }
        }
        assert!(received <= HANDOFF_CAPACITY);
    }

    #[tokio::test]
    async fn test_lost_feed_table_ends_stream_without_cancellation() {
        use diesel::connection::SimpleConnection;

        let fx = create_fixture();
        let cancel = CancellationToken::new();
        let mut events = fx.watcher.watch_users(cancel.clone()).await.unwrap();

        fx.repository.create(ann("u1"), "hash".to_string()).await.unwrap();
        assert_eq!(next_event(&mut events).await.user_id, "u1");

        let mut conn = get_connection(&fx.pool).expect("Failed to get connection");
        conn.batch_execute(
            "
            DROP TRIGGER users_after_insert;
            DROP TRIGGER users_after_update;
            DROP TRIGGER users_after_delete;
            DROP TABLE user_changes;
        ",
        )
        .expect("Failed to drop change feed");

        let closed = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("Stream did not close after the feed table was lost");
        assert!(closed.is_none());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_polling_watcher_without_writer() {
        let fx = create_fixture();
        let watcher = UserChangeStreamWatcher::polling(
            fx.pool.clone(),
            ChangeStreamOptions {
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let cancel = CancellationToken::new();
        let mut events = watcher.watch_users(cancel.clone()).await.unwrap();

        fx.repository.create(ann("u1"), "hash".to_string()).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.user_id, "u1");

        cancel.cancel();
    }
}
