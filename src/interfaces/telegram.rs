use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use teloxide::dptree;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{error, info};

use crate::core::clock;
use crate::core::delivery::{DONE_TASK_PREFIX, SNOOZE_1H_PREFIX, VIEW_TASK_PREFIX};
use crate::core::scheduler::{ReminderScheduler, reminder_job_id};
use crate::core::sink::{Action, NotificationSink};
use crate::core::store::TaskStore;
use crate::core::store::types::{JobKind, Task, category_icon, priority_icon};

/// Telegram-backed notification transport. Action buttons become a one-per-row
/// inline keyboard, mirroring how the reminder message lays out snooze/view.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, chat_id: i64, text: &str, actions: &[Action]) -> Result<()> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if !actions.is_empty() {
            let rows: Vec<Vec<InlineKeyboardButton>> = actions
                .iter()
                .map(|a| vec![InlineKeyboardButton::callback(a.label.clone(), a.callback.clone())])
                .collect();
            request = request.reply_markup(InlineKeyboardMarkup::new(rows));
        }
        request.await?;
        Ok(())
    }
}

/// Thin chat glue: list command plus the callback buttons that reach into the
/// scheduler (snooze) and the store (done, view). Task-creation dialogs live
/// elsewhere and are not part of this service.
pub struct TelegramInterface {
    bot: Bot,
    store: TaskStore,
    scheduler: Arc<ReminderScheduler>,
}

impl TelegramInterface {
    pub fn new(bot: Bot, store: TaskStore, scheduler: Arc<ReminderScheduler>) -> Self {
        Self {
            bot,
            store,
            scheduler,
        }
    }

    /// Runs the long-polling dispatcher until shutdown.
    pub async fn run(self) -> Result<()> {
        let commands = vec![
            teloxide::types::BotCommand::new("list", "הצגת כל המשימות הפתוחות"),
            teloxide::types::BotCommand::new("start", "התחלה"),
        ];
        if let Err(e) = self.bot.set_my_commands(commands).await {
            error!("Failed to set telegram bot commands: {}", e);
        }

        info!("Telegram polling starting");
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handle_message))
            .branch(Update::filter_callback_query().endpoint(handle_callback));

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.store, self.scheduler])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        Ok(())
    }
}

async fn handle_message(bot: Bot, msg: Message, store: TaskStore) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    match text.trim() {
        "/start" => {
            bot.send_message(
                msg.chat.id,
                "👋 היי! אני עוקב אחרי המשימות והתזכורות שלכם.\n📖 /list לרשימת המשימות",
            )
            .await?;
        }
        "/list" => {
            let reply = match store.pending_for_chat(msg.chat.id.0).await {
                Ok(tasks) => render_task_list(&tasks),
                Err(e) => {
                    error!("Failed to load task list for chat {}: {}", msg.chat.id.0, e);
                    "❌ לא הצלחתי לטעון את הרשימה, נסו שוב מאוחר יותר".to_string()
                }
            };
            bot.send_message(msg.chat.id, reply)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    store: TaskStore,
    scheduler: Arc<ReminderScheduler>,
) -> ResponseResult<()> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));
    bot.answer_callback_query(q.id).await?;

    if let Some(task_id) = parse_task_id(&data, SNOOZE_1H_PREFIX) {
        let fire_at = clock::now_naive() + Duration::hours(1);
        let rescheduled = store.set_reminder(task_id, Some(fire_at)).await.is_ok()
            && scheduler
                .schedule_once(
                    &reminder_job_id(task_id),
                    JobKind::Reminder,
                    fire_at,
                    task_id,
                    chat_id.0,
                )
                .await
                .is_ok();
        let reply = if rescheduled {
            format!("💤 נדחה לשעה {}", fire_at.format("%H:%M"))
        } else {
            "❌ הדחייה נכשלה".to_string()
        };
        bot.send_message(chat_id, reply).await?;
    } else if let Some(task_id) = parse_task_id(&data, DONE_TASK_PREFIX) {
        // Completion also cancels the pending reminder job; delivery would
        // have no-opped anyway, this just keeps the job table tidy.
        match store.complete_task(task_id).await {
            Ok(true) => {
                if let Err(e) = scheduler.cancel(&reminder_job_id(task_id)).await {
                    error!("Failed to cancel reminder job for task {}: {}", task_id, e);
                }
                bot.send_message(chat_id, "✅ המשימה סומנה כבוצעה!").await?;
            }
            Ok(false) => {
                bot.send_message(chat_id, "המשימה כבר סומנה כבוצעה").await?;
            }
            Err(e) => {
                error!("Failed to complete task {}: {}", task_id, e);
                bot.send_message(chat_id, "❌ העדכון נכשל").await?;
            }
        }
    } else if let Some(task_id) = parse_task_id(&data, VIEW_TASK_PREFIX) {
        let reply = match store.get_task(task_id).await {
            Ok(Some(task)) => render_task_detail(&task),
            Ok(None) => "🤷 המשימה לא נמצאה".to_string(),
            Err(e) => {
                error!("Failed to load task {}: {}", task_id, e);
                "❌ הטעינה נכשלה".to_string()
            }
        };
        bot.send_message(chat_id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

fn parse_task_id(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse().ok()
}

fn render_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "🎉 אין משימות פתוחות!".to_string();
    }
    let mut msg = format!("📋 <b>משימות פתוחות ({}):</b>\n\n", tasks.len());
    for task in tasks {
        let shared_mark = if task.is_shared_home() { " 👥" } else { "" };
        msg.push_str(&format!(
            "{} {}{}\n",
            priority_icon(&task.priority),
            task.text,
            shared_mark
        ));
    }
    msg
}

fn render_task_detail(task: &Task) -> String {
    let mut msg = format!(
        "{} <b>{}</b>\n{} {} / {}",
        priority_icon(&task.priority),
        task.text,
        category_icon(&task.parent_category),
        task.parent_category,
        task.sub_category.as_deref().unwrap_or("general"),
    );
    if let Some(reminder) = task.reminder_time {
        msg.push_str(&format!("\n⏰ {}", reminder.format("%d/%m %H:%M")));
    }
    if task.is_done() {
        msg.push_str("\n✅ בוצעה");
    }
    msg
}
