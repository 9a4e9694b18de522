pub mod hooks;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{error, info};

use crate::core::clock;
use crate::core::sink::NotificationSink;
use crate::core::store::TaskStore;
use crate::core::store::types::{Task, priority_icon, priority_rank};
use hooks::{Band, HookSource, band_for};

/// How many tasks each digest section lists before "...and N more".
const MAX_LISTED: usize = 3;

/// Builds and fans out the once-a-day summary. Reads the task store and
/// writes straight to the notification sink; the reminder path is not
/// involved.
pub struct DigestGenerator {
    store: TaskStore,
    sink: Arc<dyn NotificationSink>,
    hooks: Arc<dyn HookSource>,
    whitelist: Vec<i64>,
}

impl DigestGenerator {
    pub fn new(
        store: TaskStore,
        sink: Arc<dyn NotificationSink>,
        hooks: Arc<dyn HookSource>,
        whitelist: Vec<i64>,
    ) -> Self {
        Self {
            store,
            sink,
            hooks,
            whitelist,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let now = clock::now_naive();
        let today = now.date();
        let yesterday = today - Duration::days(1);
        let day_start = yesterday.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let day_end = yesterday.and_hms_opt(23, 59, 59).expect("end of day is valid");

        let pending = self.store.pending_tasks().await?;
        let completed = self.store.completed_between(day_start, day_end).await?;

        let (shared_pending, personal_pending): (Vec<Task>, Vec<Task>) =
            pending.into_iter().partition(Task::is_shared_home);
        let (shared_completed, personal_completed): (Vec<Task>, Vec<Task>) =
            completed.into_iter().partition(Task::is_shared_home);

        // Owners of personal pending tasks plus the configured whitelist, so
        // that someone with an empty personal list still sees shared tasks.
        let mut recipients: BTreeSet<i64> =
            personal_pending.iter().map(|t| t.chat_id).collect();
        recipients.extend(self.whitelist.iter().copied());

        for chat_id in recipients {
            let mut personal: Vec<Task> = personal_pending
                .iter()
                .filter(|t| t.chat_id == chat_id)
                .cloned()
                .collect();
            let mut shared = shared_pending.clone();

            // Shared completions count toward everyone's tally, own personal
            // completions only toward the owner's.
            let own_completed = personal_completed
                .iter()
                .filter(|t| t.chat_id == chat_id)
                .count();
            let completed_count = own_completed + shared_completed.len();
            let remaining = personal.len() + shared.len();

            // Nothing done, nothing pending: stay silent.
            if completed_count == 0 && remaining == 0 {
                continue;
            }

            sort_pending(&mut personal, now);
            sort_pending(&mut shared, now);

            let band = band_for(completed_count, remaining);
            let hook = self.hooks.pick(band);
            let text = render_digest(today, &hook, completed_count, &personal, &shared, now);

            match self.sink.send(chat_id, &text, &[]).await {
                Ok(()) => info!("Daily digest sent to chat {}", chat_id),
                Err(e) => error!("Failed to send daily digest to chat {}: {}", chat_id, e),
            }
        }
        Ok(())
    }
}

/// Priority first, oldest first within a priority. A row missing `created_at`
/// sorts as if created right now.
fn sort_pending(tasks: &mut [Task], now: NaiveDateTime) {
    tasks.sort_by_key(|t| (priority_rank(&t.priority), t.created_at.unwrap_or(now)));
}

fn age_marker(task: &Task, now: NaiveDateTime) -> &'static str {
    let Some(created) = task.created_at else {
        return "";
    };
    let days = (now - created).num_days();
    if days > 7 {
        " 🏛"
    } else if days > 3 {
        " 🐢"
    } else {
        ""
    }
}

fn render_section(msg: &mut String, title: &str, tasks: &[Task], now: NaiveDateTime) {
    if tasks.is_empty() {
        return;
    }
    msg.push_str(&format!("\n{}\n", title));
    for task in tasks.iter().take(MAX_LISTED) {
        msg.push_str(&format!(
            "{} {}{}\n",
            priority_icon(&task.priority),
            task.text,
            age_marker(task, now)
        ));
    }
    if tasks.len() > MAX_LISTED {
        msg.push_str(&format!("...ועוד {} נוספות\n", tasks.len() - MAX_LISTED));
    }
}

fn render_digest(
    date: NaiveDate,
    hook: &str,
    completed: usize,
    personal: &[Task],
    shared: &[Task],
    now: NaiveDateTime,
) -> String {
    let mut msg = format!(
        "📋 <b>סיכום יומי — {}</b>\n{}\n",
        date.format("%d/%m"),
        hook
    );
    if completed > 0 {
        msg.push_str(&format!("\n✅ הושלמו אתמול: {}", completed));
    }
    msg.push_str(&format!("\n📌 נותרו: {}\n", personal.len() + shared.len()));
    render_section(&mut msg, "🙋 <b>אישי:</b>", personal, now);
    render_section(&mut msg, "👥 <b>משותף:</b>", shared, now);
    msg.push_str("\n📖 /list לרשימה המלאה");
    msg
}
