use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::clock;
use crate::core::delivery::ReminderDelivery;
use crate::core::digest::DigestGenerator;
use crate::core::store::TaskStore;
use crate::core::store::types::{JobKind, JobRecord};

pub const DIGEST_JOB_ID: &str = "daily_digest";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Deterministic job id: rescheduling a task's reminder replaces the prior
/// trigger instead of adding a second one.
pub fn reminder_job_id(task_id: i64) -> String {
    format!("reminder_{}", task_id)
}

/// Statically bound handlers for each job kind. A persisted row only names
/// its kind tag; there is nothing dynamic to resolve at dispatch time.
pub struct JobDispatcher {
    delivery: ReminderDelivery,
    digest: DigestGenerator,
}

impl JobDispatcher {
    pub fn new(delivery: ReminderDelivery, digest: DigestGenerator) -> Self {
        Self { delivery, digest }
    }

    async fn run(&self, job: JobRecord) {
        match JobKind::parse(&job.kind) {
            Some(JobKind::Reminder) => {
                let (Some(task_id), Some(chat_id)) = (job.task_id, job.chat_id) else {
                    warn!("Reminder job {} is missing its payload, skipping", job.id);
                    return;
                };
                if let Err(e) = self.delivery.deliver(task_id, chat_id).await {
                    error!("Reminder job {} failed: {}", job.id, e);
                }
            }
            Some(JobKind::Digest) => {
                if let Err(e) = self.digest.run().await {
                    error!("Digest job {} failed: {}", job.id, e);
                }
            }
            // Unknown kinds are purged at startup; a row slipping through is
            // dropped here rather than crashing dispatch.
            None => warn!("Job {} has unknown kind '{}', skipping", job.id, job.kind),
        }
    }
}

/// Durable, time-triggered job engine. The persisted `scheduled_jobs` table
/// is the source of truth; a background loop claims due rows and spawns each
/// one onto its own task, so callers of the schedule/cancel operations never
/// wait for a job to run.
pub struct ReminderScheduler {
    store: TaskStore,
    dispatcher: Arc<JobDispatcher>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(store: TaskStore, dispatcher: JobDispatcher) -> Self {
        Self {
            store,
            dispatcher: Arc::new(dispatcher),
            loop_handle: Mutex::new(None),
        }
    }

    /// Reconcile the persisted job table, then start the dispatch loop.
    /// Purge failure is logged and dispatch proceeds: the table may simply
    /// not exist yet on a fresh database.
    pub async fn start(&self) -> Result<()> {
        match self.store.purge_unknown_job_kinds().await {
            Ok(0) => {}
            Ok(n) => warn!("Purged {} scheduler job(s) with unrecognized kinds", n),
            Err(e) => warn!("Stale-job purge failed (continuing): {}", e),
        }
        match self.list_ids().await {
            Ok(ids) => info!("Scheduler resuming with {} persisted job(s)", ids.len()),
            Err(e) => warn!("Could not count persisted jobs: {}", e),
        }

        let store = self.store.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = run_due(&store, &dispatcher).await {
                    warn!("Scheduler tick failed: {}", e);
                }
            }
        });
        *self.loop_handle.lock().await = Some(handle);
        info!("Scheduler dispatch loop started");
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
            info!("Scheduler dispatch loop stopped");
        }
    }

    /// Persist a one-shot trigger, atomically replacing any job with the
    /// same id.
    pub async fn schedule_once(
        &self,
        job_id: &str,
        kind: JobKind,
        fire_at: NaiveDateTime,
        task_id: i64,
        chat_id: i64,
    ) -> Result<()> {
        self.store
            .upsert_job(&JobRecord {
                id: job_id.to_string(),
                kind: kind.as_str().to_string(),
                fire_at: Some(fire_at),
                cron: None,
                task_id: Some(task_id),
                chat_id: Some(chat_id),
            })
            .await
    }

    /// Persist a recurring trigger. A no-op when the id already exists, so
    /// fixed jobs can be re-registered on every boot.
    pub async fn schedule_cron(&self, job_id: &str, cron_spec: &str, kind: JobKind) -> Result<()> {
        if self.store.job_exists(job_id).await? {
            return Ok(());
        }
        let next = next_occurrence(cron_spec)
            .with_context(|| format!("invalid cron spec '{}'", cron_spec))?;
        self.store
            .upsert_job(&JobRecord {
                id: job_id.to_string(),
                kind: kind.as_str().to_string(),
                fire_at: Some(next),
                cron: Some(cron_spec.to_string()),
                task_id: None,
                chat_id: None,
            })
            .await
    }

    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.store.delete_job(job_id).await?;
        Ok(())
    }

    pub async fn list_ids(&self) -> Result<HashSet<String>> {
        self.store.list_job_ids().await
    }

    /// Claim and run everything that is due. Returns the handles of the
    /// spawned runs so callers (mainly tests) can join them.
    pub async fn run_due_jobs(&self) -> Result<Vec<JoinHandle<()>>> {
        run_due(&self.store, &self.dispatcher).await
    }
}

/// One-shot rows are consumed; cron rows jump to their next occurrence, so
/// an overdue cron job fires once no matter how many intervals were missed.
/// Every due job runs on its own spawned task, off the dispatch loop.
async fn run_due(store: &TaskStore, dispatcher: &Arc<JobDispatcher>) -> Result<Vec<JoinHandle<()>>> {
    let now = clock::now_naive();
    let due = store.due_jobs(now).await?;
    let mut handles = Vec::new();
    for job in due {
        match &job.cron {
            Some(spec) => match next_occurrence(spec) {
                Some(next) => store.advance_cron_job(&job.id, next).await?,
                None => {
                    warn!("Job {} has unparseable cron '{}', removing", job.id, spec);
                    store.delete_job(&job.id).await?;
                    continue;
                }
            },
            None => {
                store.delete_job(&job.id).await?;
            }
        }
        let dispatcher = Arc::clone(dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher.run(job).await;
        }));
    }
    Ok(handles)
}

fn next_occurrence(spec: &str) -> Option<NaiveDateTime> {
    let schedule = cron::Schedule::from_str(spec).ok()?;
    schedule.after(&clock::now()).next().map(clock::to_naive)
}
