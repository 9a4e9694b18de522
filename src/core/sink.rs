use anyhow::Result;
use async_trait::async_trait;

/// An inline action offered with a notification. The callback string comes
/// back through the chat transport when the button is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub callback: String,
}

impl Action {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
        }
    }
}

/// Outbound notification transport. Fire-and-forget from the caller's point
/// of view: an Err means the transport refused the message, and callers log
/// it rather than retry.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, actions: &[Action]) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct SentMessage {
        pub chat_id: i64,
        pub text: String,
        pub actions: Vec<Action>,
    }

    /// Records every send; optionally fails for selected chats to exercise
    /// per-recipient error isolation.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<SentMessage>>,
        pub fail_for: Vec<i64>,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<SentMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, chat_id: i64, text: &str, actions: &[Action]) -> Result<()> {
            if self.fail_for.contains(&chat_id) {
                anyhow::bail!("transport unavailable for chat {}", chat_id);
            }
            self.sent.lock().unwrap().push(SentMessage {
                chat_id,
                text: text.to_string(),
                actions: actions.to_vec(),
            });
            Ok(())
        }
    }
}
