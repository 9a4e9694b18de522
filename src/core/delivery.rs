use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::core::sink::{Action, NotificationSink};
use crate::core::store::TaskStore;

pub const SNOOZE_1H_PREFIX: &str = "snooze_1h_";
pub const VIEW_TASK_PREFIX: &str = "view_task_";
pub const DONE_TASK_PREFIX: &str = "done_task_";

/// Fires a single reminder. Invoked by the scheduler at the scheduled time,
/// or immediately by the recovery sweep.
pub struct ReminderDelivery {
    store: TaskStore,
    sink: Arc<dyn NotificationSink>,
}

impl ReminderDelivery {
    pub fn new(store: TaskStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// Re-reads the task fresh: time has passed since scheduling, so captured
    /// state is never trusted. A missing or done task is a no-op, which is
    /// what makes a stale job harmless if one ever survives completion.
    pub async fn deliver(&self, task_id: i64, chat_id: i64) -> Result<()> {
        let task = match self.store.get_task(task_id).await? {
            Some(task) if !task.is_done() => task,
            _ => {
                info!(
                    "Skipping reminder for task {}: task not found or already done",
                    task_id
                );
                return Ok(());
            }
        };

        let text = format!("⏰ <b>תזכורת למשימה:</b>\n{}", task.text);
        let actions = [
            Action::new("💤 נודניק (1 שעה)", format!("{}{}", SNOOZE_1H_PREFIX, task.id)),
            Action::new("✏️ ערוך/צפה", format!("{}{}", VIEW_TASK_PREFIX, task.id)),
        ];

        // Transport failure is logged, not retried and not propagated:
        // a failed send must not take down the dispatch loop.
        match self.sink.send(chat_id, &text, &actions).await {
            Ok(()) => info!("Reminder sent for task {} to chat {}", task_id, chat_id),
            Err(e) => error!("Failed to send reminder for task {}: {}", task_id, e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::testing::RecordingSink;
    use crate::core::store::types::NewTask;

    fn service(sink: Arc<RecordingSink>) -> (ReminderDelivery, TaskStore) {
        let store = TaskStore::open_in_memory().unwrap();
        (ReminderDelivery::new(store.clone(), sink), store)
    }

    #[tokio::test]
    async fn delivers_current_text_with_snooze_and_view_actions() {
        let sink = Arc::new(RecordingSink::default());
        let (delivery, store) = service(sink.clone());
        let id = store
            .insert_task(&NewTask::new(100, "להוציא את הזבל"))
            .await
            .unwrap();

        delivery.deliver(id, 100).await.unwrap();

        let sent = sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 100);
        assert!(sent[0].text.contains("להוציא את הזבל"));
        assert_eq!(sent[0].actions[0].callback, format!("snooze_1h_{}", id));
        assert_eq!(sent[0].actions[1].callback, format!("view_task_{}", id));
    }

    #[tokio::test]
    async fn done_task_produces_zero_transport_calls() {
        let sink = Arc::new(RecordingSink::default());
        let (delivery, store) = service(sink.clone());
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();
        store.complete_task(id).await.unwrap();

        delivery.deliver(id, 100).await.unwrap();
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn missing_task_is_a_noop() {
        let sink = Arc::new(RecordingSink::default());
        let (delivery, _store) = service(sink.clone());
        delivery.deliver(12345, 100).await.unwrap();
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail_for: vec![100],
            ..Default::default()
        });
        let (delivery, store) = service(sink.clone());
        let id = store.insert_task(&NewTask::new(100, "t")).await.unwrap();
        // Must not bubble up into the dispatch loop.
        delivery.deliver(id, 100).await.unwrap();
    }
}
