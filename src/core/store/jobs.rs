use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Row, params};

use super::TaskStore;
use super::types::{JobKind, JobRecord};
use crate::core::clock;

fn map_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        fire_at: row
            .get::<_, Option<String>>(2)?
            .as_deref()
            .and_then(clock::parse_ts),
        cron: row.get(3)?,
        task_id: row.get(4)?,
        chat_id: row.get(5)?,
    })
}

impl TaskStore {
    /// Persist (or atomically replace) a job. A single INSERT OR REPLACE
    /// leaves no window where the old and new trigger both exist.
    pub async fn upsert_job(&self, job: &JobRecord) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT OR REPLACE INTO scheduled_jobs (id, kind, fire_at, cron, task_id, chat_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.id,
                job.kind,
                job.fire_at.map(clock::format_ts),
                job.cron,
                job.task_id,
                job.chat_id,
            ],
        )?;
        Ok(())
    }

    pub async fn job_exists(&self, id: &str) -> Result<bool> {
        let db = self.db().lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM scheduled_jobs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn list_job_ids(&self) -> Result<HashSet<String>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare("SELECT id FROM scheduled_jobs")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Delete a job; absence is not an error.
    pub async fn delete_job(&self, id: &str) -> Result<bool> {
        let db = self.db().lock().await;
        let deleted = db.execute("DELETE FROM scheduled_jobs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Jobs whose fire time has arrived, oldest first. Lateness is unbounded:
    /// a job stays runnable no matter how overdue it is.
    pub async fn due_jobs(&self, now: NaiveDateTime) -> Result<Vec<JobRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, kind, fire_at, cron, task_id, chat_id FROM scheduled_jobs \
             WHERE fire_at IS NOT NULL AND fire_at <= ?1 ORDER BY fire_at",
        )?;
        let rows = stmt.query_map(params![clock::format_ts(now)], map_job)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Advance a recurring job to its next occurrence. Missed intervals
    /// coalesce: the row fires once and jumps straight to `next`.
    pub async fn advance_cron_job(&self, id: &str, next: NaiveDateTime) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "UPDATE scheduled_jobs SET fire_at = ?1 WHERE id = ?2",
            params![clock::format_ts(next), id],
        )?;
        Ok(())
    }

    /// Remove rows whose kind tag is no longer recognized (written by a prior
    /// schema). Runs in one transaction; rolled back as a unit on failure.
    pub async fn purge_unknown_job_kinds(&self) -> Result<usize> {
        let mut db = self.db().lock().await;
        let tx = db.transaction()?;
        let [reminder, digest] = JobKind::all();
        let purged = tx.execute(
            "DELETE FROM scheduled_jobs WHERE kind NOT IN (?1, ?2)",
            params![reminder.as_str(), digest.as_str()],
        )?;
        tx.commit()?;
        Ok(purged)
    }
}
