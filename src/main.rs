mod config;
mod core;
mod interfaces;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info};

use crate::config::Config;
use crate::core::delivery::ReminderDelivery;
use crate::core::digest::DigestGenerator;
use crate::core::digest::hooks::RandomHooks;
use crate::core::recovery::recover_missed_reminders;
use crate::core::scheduler::{DIGEST_JOB_ID, JobDispatcher, ReminderScheduler};
use crate::core::sink::NotificationSink;
use crate::core::store::TaskStore;
use crate::core::store::types::JobKind;
use crate::interfaces::telegram::{TelegramInterface, TelegramSink};

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = run().await {
        error!("FATAL: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // 1. Environment
    let cfg = Config::from_env()?;

    // 2. Store: open, probe, migrate, verify
    info!("Initializing database...");
    let store = TaskStore::open(&cfg.db_path).context("failed to open task database")?;
    store
        .check_connectivity()
        .await
        .context("database connectivity test failed")?;
    info!("Database connectivity: OK");
    info!("Running migrations...");
    store.run_migrations().await;
    store
        .verify_schema()
        .await
        .context("completed_at column missing after migration")?;
    info!("Schema verification: OK");

    // 3. Scheduler wiring
    let bot = Bot::new(&cfg.bot_token);
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramSink::new(bot.clone()));
    let delivery = ReminderDelivery::new(store.clone(), sink.clone());
    let digest = DigestGenerator::new(
        store.clone(),
        sink.clone(),
        Arc::new(RandomHooks),
        cfg.allowed_users.clone(),
    );
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        JobDispatcher::new(delivery, digest),
    ));

    info!("Starting scheduler...");
    scheduler.start().await?;
    scheduler
        .schedule_cron(DIGEST_JOB_ID, &cfg.digest_cron, JobKind::Digest)
        .await
        .context("failed to register daily digest job")?;

    // 3b. Catch up on reminders missed during downtime. Non-blocking: the
    // sweep only enqueues jobs, delivery happens on the dispatch loop.
    info!("Checking for missed reminders...");
    recover_missed_reminders(&store, &scheduler).await;

    // 4. Bot polling (blocks until shutdown)
    info!("All startup steps completed. Launching polling...");
    let interface = TelegramInterface::new(bot, store, scheduler.clone());
    let result = interface.run().await;

    scheduler.stop().await;
    result
}
