use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::error;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use userfeed_core::errors::{DatabaseError, Error, Result};

// Type alias for the job to be executed by the writer actor.
// It takes a mutable reference to a SqliteConnection and returns a Result.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = (
    Job<Box<dyn Any + Send + 'static>>,
    oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>,
);

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<ErasedJob>,
    // Bumped after every committed job.
    commits: Arc<watch::Sender<u64>>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection.
    ///
    /// The job runs inside an immediate transaction; an `Err` rolls it back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| writer_stopped())?;

        let boxed = ret_rx.await.map_err(|_| writer_stopped())??;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Failed to downcast writer actor result".to_string(),
            ))
        })
    }

    /// Subscribes to the commit counter.
    ///
    /// The value changes after every successful write transaction, so readers
    /// of derived tables (such as the change feed) can wake up immediately.
    pub fn subscribe_commits(&self) -> watch::Receiver<u64> {
        self.commits.subscribe()
    }
}

fn writer_stopped() -> Error {
    Error::Database(DatabaseError::Internal(
        "Writer actor is no longer running".to_string(),
    ))
}

/// Spawns a background Tokio task that acts as a single writer to the database.
/// This actor owns one database connection from the pool and processes write jobs serially.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    // The channel is bounded; 1024 is an arbitrary size.
    let (tx, mut rx) = mpsc::channel::<ErasedJob>(1024);
    let (commits, _) = watch::channel(0u64);
    let commits = Arc::new(commits);
    let actor_commits = commits.clone();

    tokio::spawn(async move {
        // Held for the lifetime of the actor.
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not acquire a database connection: {}", e);
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            if result.is_ok() {
                actor_commits.send_modify(|n| *n = n.wrapping_add(1));
            }

            // The requester may have gone away (timeout, cancellation).
            let _ = reply_tx.send(result);
        }
    });

    WriteHandle { tx, commits }
}
