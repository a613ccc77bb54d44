//! Single writer thread. Every job runs inside an immediate transaction, so a job
//! either commits completely or leaves no trace.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use pocketplan_core::errors::{DatabaseError, Error, Result};

use super::DbPool;
use crate::errors::StorageError;

/// Upper bound on queueing plus execution of one write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type WriteJob = Box<dyn FnOnce(Result<&mut SqliteConnection>) + Send + 'static>;

enum WriteMessage {
    Job(WriteJob),
    Shutdown,
}

enum TransactionError {
    App(Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TransactionError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Diesel(err)
    }
}

fn run_in_transaction<F, T>(conn: &mut SqliteConnection, f: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    conn.immediate_transaction::<T, TransactionError, _>(|conn| f(conn).map_err(TransactionError::App))
        .map_err(|err| match err {
            TransactionError::App(err) => err,
            TransactionError::Diesel(err) => StorageError::from(err).into(),
        })
}

/// Cloneable handle used by repositories to submit writes.
#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<WriteMessage>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
    timeout: Duration,
}

impl WriteHandle {
    /// Runs `job` on the writer thread and waits for its result.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: WriteJob = Box::new(move |conn: Result<&mut SqliteConnection>| {
            let result = conn.and_then(|conn| run_in_transaction(conn, job));
            let _ = reply_tx.send(result);
        });

        self.sender
            .send(WriteMessage::Job(boxed))
            .map_err(|_| Error::Database(DatabaseError::ConnectionFailed("writer is stopped".to_string())))?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Database(DatabaseError::Internal(
                "writer dropped the job without replying".to_string(),
            ))),
            Err(_) => Err(Error::Database(DatabaseError::Timeout(
                self.timeout.as_millis() as u64,
            ))),
        }
    }

    /// Asks the writer to stop once queued jobs are done and joins its thread.
    pub fn shutdown(&self) {
        let _ = self.sender.send(WriteMessage::Shutdown);
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!("[Storage] Writer thread handle lock poisoned");
                None
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("[Storage] Writer thread panicked");
            }
        }
    }
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<WriteMessage>();

    let handle = std::thread::spawn(move || {
        while let Some(message) = receiver.blocking_recv() {
            match message {
                WriteMessage::Job(job) => match pool.get() {
                    Ok(mut conn) => job(Ok(&mut *conn)),
                    Err(e) => job(Err(StorageError::from(e).into())),
                },
                WriteMessage::Shutdown => break,
            }
        }
        debug!("[Storage] Writer thread stopped");
    });

    WriteHandle {
        sender,
        thread: Arc::new(Mutex::new(Some(handle))),
        timeout: WRITE_TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations};
    use diesel::prelude::*;
    use diesel::sql_types::BigInt;
    use tempfile::TempDir;

    #[derive(QueryableByName)]
    struct CountRow {
        #[diesel(sql_type = BigInt)]
        c: i64,
    }

    fn setup() -> (TempDir, WriteHandle, Arc<DbPool>) {
        let dir = TempDir::new().expect("tempdir");
        let db_path = init(&dir.path().to_string_lossy()).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        (dir, writer, pool)
    }

    fn count_rows(pool: &DbPool) -> i64 {
        let mut conn = pool.get().expect("conn");
        diesel::sql_query("SELECT COUNT(*) AS c FROM plan_sessions")
            .get_result::<CountRow>(&mut conn)
            .expect("count")
            .c
    }

    #[tokio::test]
    async fn failed_job_rolls_back_its_writes() {
        let (_dir, writer, pool) = setup();

        let result = writer
            .exec(|conn| {
                diesel::sql_query(
                    "INSERT INTO plan_sessions (token_hash, plan_json, created_at, updated_at, last_seen_at) \
                     VALUES ('h1', '{}', 'x', 'x', 'x')",
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Err::<(), _>(Error::Unexpected("abort".to_string()))
            })
            .await;

        assert!(matches!(result, Err(Error::Unexpected(_))));
        assert_eq!(count_rows(&pool), 0);
    }

    #[tokio::test]
    async fn jobs_after_shutdown_fail_fast() {
        let (_dir, writer, _pool) = setup();
        writer.exec(|_| Ok(())).await.expect("first job");

        writer.shutdown();
        let err = writer.exec(|_| Ok(())).await.expect_err("stopped");
        assert!(err.is_retryable());
    }
}
