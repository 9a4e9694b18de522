use tracing::{error, info, warn};

use crate::core::clock;
use crate::core::scheduler::{ReminderScheduler, reminder_job_id};
use crate::core::store::TaskStore;
use crate::core::store::types::JobKind;

/// One-time startup sweep for reminders whose fire time passed while the
/// process was down. Each match gets an immediate one-shot job; delivery
/// itself happens on the scheduler's dispatch, not here, so boot never
/// blocks on the transport.
pub async fn recover_missed_reminders(store: &TaskStore, scheduler: &ReminderScheduler) {
    let now = clock::now_naive();

    // Fetch all (task, chat) pairs first; the store lock is released before
    // any scheduling call below.
    let overdue = match store.overdue_reminders(now).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Missed-reminder sweep aborted: {}", e);
            return;
        }
    };

    if overdue.is_empty() {
        info!("No missed reminders to recover");
        return;
    }
    info!("Recovering {} missed reminder(s)", overdue.len());

    for (task_id, chat_id) in overdue {
        let Some(chat_id) = chat_id else {
            warn!("Task {} has no chat id, skipping recovery", task_id);
            continue;
        };
        if let Err(e) = scheduler
            .schedule_once(&reminder_job_id(task_id), JobKind::Reminder, now, task_id, chat_id)
            .await
        {
            error!("Failed to schedule recovered reminder for task {}: {}", task_id, e);
        }
    }
}
