mod jobs;
mod tasks;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

/// Raw-SQL column migrations for databases created by earlier versions.
/// Each step is independent: failure (usually "duplicate column") is logged
/// and skipped, never fatal.
const MIGRATIONS: &[(&str, &str, &str)] = &[
    (
        "tasks",
        "sub_category",
        "ALTER TABLE tasks ADD COLUMN sub_category TEXT",
    ),
    (
        "tasks",
        "is_shared",
        "ALTER TABLE tasks ADD COLUMN is_shared INTEGER DEFAULT 0",
    ),
    (
        "tasks",
        "completed_at",
        "ALTER TABLE tasks ADD COLUMN completed_at TIMESTAMP",
    ),
];

#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Mutex<Connection>>,
}

impl TaskStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path)?;
        Self::from_connection(db)
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'normal',
                parent_category TEXT NOT NULL DEFAULT 'home',
                sub_category TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                reminder_time TIMESTAMP,
                is_shared INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP,
                completed_at TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS scheduled_jobs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                fire_at TIMESTAMP,
                cron TEXT,
                task_id INTEGER,
                chat_id BIGINT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_chat_status ON tasks(chat_id, status)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status_reminder ON tasks(status, reminder_time)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_fire_at ON scheduled_jobs(fire_at)",
            [],
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Boot connectivity probe. Fatal at startup when this fails: nothing
    /// downstream can function without the store.
    pub async fn check_connectivity(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub async fn run_migrations(&self) {
        let db = self.db.lock().await;
        for (table, column, sql) in MIGRATIONS {
            match db.execute(sql, []) {
                Ok(_) => info!("Migration OK: '{}' on '{}'", column, table),
                Err(e) => info!("Migration skipped: '{}' on '{}': {}", column, table, e),
            }
        }
    }

    /// Post-migration sanity check for the column the digest depends on.
    pub async fn verify_schema(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.prepare("SELECT completed_at FROM tasks LIMIT 0")?;
        Ok(())
    }

    pub(crate) fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }
}
