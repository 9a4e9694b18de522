use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Row, params};

use super::TaskStore;
use super::types::{NewTask, STATUS_DONE, STATUS_PENDING, Task};
use crate::core::clock;

const TASK_COLUMNS: &str = "id, chat_id, text, priority, parent_category, sub_category, \
     status, reminder_time, is_shared, created_at, completed_at";

fn map_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        text: row.get(2)?,
        priority: row.get(3)?,
        parent_category: row.get(4)?,
        sub_category: row.get(5)?,
        status: row.get(6)?,
        reminder_time: parse_opt_ts(row.get(7)?),
        is_shared: row.get::<_, i64>(8)? != 0,
        created_at: parse_opt_ts(row.get(9)?),
        completed_at: parse_opt_ts(row.get(10)?),
    })
}

fn parse_opt_ts(raw: Option<String>) -> Option<NaiveDateTime> {
    raw.as_deref().and_then(clock::parse_ts)
}

impl TaskStore {
    pub async fn insert_task(&self, task: &NewTask) -> Result<i64> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO tasks (chat_id, text, priority, parent_category, sub_category, \
             status, reminder_time, is_shared, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.chat_id,
                task.text,
                task.priority,
                task.parent_category,
                task.sub_category,
                STATUS_PENDING,
                task.reminder_time.map(clock::format_ts),
                task.is_shared as i64,
                clock::format_ts(clock::now_naive()),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let db = self.db().lock().await;
        let mut stmt =
            db.prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))?;
        let mut rows = stmt.query_map(params![id], map_task)?;
        match rows.next() {
            Some(task) => Ok(Some(task?)),
            None => Ok(None),
        }
    }

    /// Rewrite (or clear) a task's reminder time. The caller owns the matching
    /// reschedule/cancel of the persisted job.
    pub async fn set_reminder(&self, id: i64, reminder: Option<NaiveDateTime>) -> Result<bool> {
        let db = self.db().lock().await;
        let changed = db.execute(
            "UPDATE tasks SET reminder_time = ?1 WHERE id = ?2",
            params![reminder.map(clock::format_ts), id],
        )?;
        Ok(changed > 0)
    }

    /// Terminal transition to done. `completed_at` is written exactly once:
    /// a task that is already done keeps its original completion time.
    pub async fn complete_task(&self, id: i64) -> Result<bool> {
        let db = self.db().lock().await;
        let changed = db.execute(
            "UPDATE tasks SET status = ?1, completed_at = ?2 \
             WHERE id = ?3 AND status = ?4",
            params![
                STATUS_DONE,
                clock::format_ts(clock::now_naive()),
                id,
                STATUS_PENDING
            ],
        )?;
        Ok(changed > 0)
    }

    /// Pending tasks visible to one chat: their own plus shared home tasks.
    /// Ordered for display: priority first, oldest first within a priority.
    pub async fn pending_for_chat(&self, chat_id: i64) -> Result<Vec<Task>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM tasks \
             WHERE status = ?1 AND (chat_id = ?2 OR (is_shared = 1 AND parent_category = 'home')) \
             ORDER BY CASE priority \
                 WHEN 'urgent' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 ELSE 99 END, \
                 created_at",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![STATUS_PENDING, chat_id], map_task)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// All pending tasks, for the digest fan-out.
    pub async fn pending_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM tasks WHERE status = ?1 ORDER BY created_at",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![STATUS_PENDING], map_task)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Tasks completed within [from, to], inclusive.
    pub async fn completed_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Task>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM tasks \
             WHERE status = ?1 AND completed_at >= ?2 AND completed_at <= ?3",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![STATUS_DONE, clock::format_ts(from), clock::format_ts(to)],
            map_task,
        )?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// (task id, chat id) pairs for pending tasks whose reminder already
    /// elapsed. Rows with an unusable chat id are skipped by the caller.
    pub async fn overdue_reminders(&self, now: NaiveDateTime) -> Result<Vec<(i64, Option<i64>)>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, chat_id FROM tasks \
             WHERE status = ?1 AND reminder_time IS NOT NULL AND reminder_time <= ?2 \
             ORDER BY reminder_time",
        )?;
        let rows = stmt.query_map(params![STATUS_PENDING, clock::format_ts(now)], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?))
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::{CATEGORY_HOME, PRIORITY_LOW, PRIORITY_URGENT};
    use chrono::Duration;

    fn shared_home(chat_id: i64, text: &str) -> NewTask {
        let mut t = NewTask::new(chat_id, text);
        t.parent_category = CATEGORY_HOME.to_string();
        t.is_shared = true;
        t
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = TaskStore::open_in_memory().unwrap();
        let reminder = clock::now_naive() + Duration::hours(2);
        let mut new = NewTask::new(100, "לקנות חלב");
        new.reminder_time = Some(reminder);
        let id = store.insert_task(&new).await.unwrap();

        let task = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.chat_id, 100);
        assert_eq!(task.text, "לקנות חלב");
        assert_eq!(task.status, STATUS_PENDING);
        assert_eq!(
            task.reminder_time.map(clock::format_ts),
            Some(clock::format_ts(reminder))
        );
        assert!(task.created_at.is_some());
        assert!(task.completed_at.is_none());
    }

    #[tokio::test]
    async fn get_missing_task_is_none() {
        let store = TaskStore::open_in_memory().unwrap();
        assert!(store.get_task(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_sets_completed_at_exactly_once() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();

        assert!(store.complete_task(id).await.unwrap());
        let first = store.get_task(id).await.unwrap().unwrap();
        assert!(first.is_done());
        let completed_at = first.completed_at.unwrap();

        // Second completion is a no-op and keeps the original timestamp.
        assert!(!store.complete_task(id).await.unwrap());
        let second = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(second.completed_at, Some(completed_at));
    }

    #[tokio::test]
    async fn status_matches_completed_at_presence() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();
        let pending = store.get_task(id).await.unwrap().unwrap();
        assert!(!pending.is_done() && pending.completed_at.is_none());
        store.complete_task(id).await.unwrap();
        let done = store.get_task(id).await.unwrap().unwrap();
        assert!(done.is_done() && done.completed_at.is_some());
    }

    #[tokio::test]
    async fn pending_for_chat_includes_shared_home_and_orders_by_priority() {
        let store = TaskStore::open_in_memory().unwrap();
        let mut low = NewTask::new(100, "low");
        low.priority = PRIORITY_LOW.to_string();
        store.insert_task(&low).await.unwrap();
        let mut urgent = NewTask::new(100, "urgent");
        urgent.priority = PRIORITY_URGENT.to_string();
        store.insert_task(&urgent).await.unwrap();
        store.insert_task(&shared_home(200, "shared")).await.unwrap();
        store.insert_task(&NewTask::new(300, "other")).await.unwrap();

        let visible = store.pending_for_chat(100).await.unwrap();
        let texts: Vec<&str> = visible.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["urgent", "shared", "low"]);
    }

    #[tokio::test]
    async fn completed_between_respects_bounds() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();
        store.complete_task(id).await.unwrap();

        let now = clock::now_naive();
        let hits = store
            .completed_between(now - Duration::minutes(1), now + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .completed_between(now - Duration::days(2), now - Duration::days(1))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn overdue_reminders_filters_done_and_future() {
        let store = TaskStore::open_in_memory().unwrap();
        let now = clock::now_naive();

        let mut overdue = NewTask::new(100, "overdue");
        overdue.reminder_time = Some(now - Duration::hours(1));
        let overdue_id = store.insert_task(&overdue).await.unwrap();

        let mut future = NewTask::new(100, "future");
        future.reminder_time = Some(now + Duration::hours(1));
        store.insert_task(&future).await.unwrap();

        let mut done = NewTask::new(100, "done");
        done.reminder_time = Some(now - Duration::hours(2));
        let done_id = store.insert_task(&done).await.unwrap();
        store.complete_task(done_id).await.unwrap();

        store.insert_task(&NewTask::new(100, "no reminder")).await.unwrap();

        let hits = store.overdue_reminders(now).await.unwrap();
        assert_eq!(hits, vec![(overdue_id, Some(100))]);
    }

    #[tokio::test]
    async fn set_reminder_rewrites_and_clears() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();
        let at = clock::now_naive() + Duration::hours(1);
        assert!(store.set_reminder(id, Some(at)).await.unwrap());
        assert_eq!(
            store
                .get_task(id)
                .await
                .unwrap()
                .unwrap()
                .reminder_time
                .map(clock::format_ts),
            Some(clock::format_ts(at))
        );
        assert!(store.set_reminder(id, None).await.unwrap());
        assert!(store.get_task(id).await.unwrap().unwrap().reminder_time.is_none());
        assert!(!store.set_reminder(999, None).await.unwrap());
    }
}
