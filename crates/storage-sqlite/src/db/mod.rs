//! Database bootstrap: file location, migrations, pool and writer lifecycle.

pub mod write_actor;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};

use pocketplan_core::plans::PlanFamilyConfig;
use pocketplan_core::Result;

use crate::errors::StorageError;
use crate::plans::PlanRepository;

pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DB_FILE_NAME: &str = "pocketplan.db";
const POOL_MAX_SIZE: u32 = 8;
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT_MS: u64 = 5_000;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied whenever the pool hands out a connection.
#[derive(Debug)]
struct SqliteConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqliteConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            BUSY_TIMEOUT_MS
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Ensures the data directory exists and returns the database file path.
pub fn init(app_data_dir: &str) -> Result<String> {
    std::fs::create_dir_all(app_data_dir).map_err(StorageError::from)?;
    let db_path = Path::new(app_data_dir).join(DB_FILE_NAME);
    Ok(db_path.to_string_lossy().to_string())
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    for version in applied {
        info!("[Storage] Applied migration {}", version);
    }
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .connection_timeout(POOL_CONNECTION_TIMEOUT)
        .connection_customizer(Box::new(SqliteConnectionOptions))
        .build(manager)
        .map_err(StorageError::from)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    Ok(pool.get().map_err(StorageError::from)?)
}

/// Explicitly owned storage handle: opened at process start, closed at shutdown.
pub struct Database {
    db_path: String,
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl Database {
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());
        info!("[Storage] Opened database at {}", db_path);
        Ok(Self {
            db_path,
            pool,
            writer,
        })
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub fn pool(&self) -> Arc<DbPool> {
        self.pool.clone()
    }

    pub fn writer(&self) -> WriteHandle {
        self.writer.clone()
    }

    pub fn plan_repository(&self, family: PlanFamilyConfig) -> Result<PlanRepository> {
        PlanRepository::new(self.pool(), self.writer(), family)
    }

    /// Stops the writer after it drains already queued jobs. Blocks until the
    /// writer thread exits.
    pub fn close(self) {
        debug!("[Storage] Closing database at {}", self.db_path);
        self.writer.shutdown();
    }
}
