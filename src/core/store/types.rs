use chrono::NaiveDateTime;

pub const CATEGORY_HOME: &str = "home";
pub const CATEGORY_WORK: &str = "work";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_DONE: &str = "done";

pub const PRIORITY_URGENT: &str = "urgent";
pub const PRIORITY_NORMAL: &str = "normal";
pub const PRIORITY_LOW: &str = "low";

/// Sort rank for digest/list ordering. Unknown values sink to the bottom.
pub fn priority_rank(priority: &str) -> u8 {
    match priority {
        PRIORITY_URGENT => 0,
        PRIORITY_NORMAL => 1,
        PRIORITY_LOW => 2,
        _ => 99,
    }
}

pub fn priority_icon(priority: &str) -> &'static str {
    match priority {
        PRIORITY_URGENT => "🔴",
        PRIORITY_LOW => "🟢",
        _ => "🟡",
    }
}

pub fn category_icon(parent_category: &str) -> &'static str {
    if parent_category == CATEGORY_WORK {
        "💼"
    } else {
        "🏠"
    }
}

/// A task row as read from SQLite. String fields carry the raw stored
/// values so that rows written by older schema versions still load.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub chat_id: i64,
    pub text: String,
    pub priority: String,
    pub parent_category: String,
    pub sub_category: Option<String>,
    pub status: String,
    pub reminder_time: Option<NaiveDateTime>,
    pub is_shared: bool,
    pub created_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == STATUS_DONE
    }

    /// Shared visibility is only defined under the home category.
    pub fn is_shared_home(&self) -> bool {
        self.is_shared && self.parent_category == CATEGORY_HOME
    }
}

/// Insert payload; `created_at` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub chat_id: i64,
    pub text: String,
    pub priority: String,
    pub parent_category: String,
    pub sub_category: Option<String>,
    pub reminder_time: Option<NaiveDateTime>,
    pub is_shared: bool,
}

impl NewTask {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            priority: PRIORITY_NORMAL.to_string(),
            parent_category: CATEGORY_HOME.to_string(),
            sub_category: Some("general".to_string()),
            reminder_time: None,
            is_shared: false,
        }
    }
}

/// Closed set of things the scheduler knows how to run. Persisted rows store
/// the tag, never a function reference, so an unknown tag can only come from
/// a prior schema and is purged at startup instead of failing dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Reminder,
    Digest,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Reminder => "reminder",
            JobKind::Digest => "digest",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reminder" => Some(JobKind::Reminder),
            "digest" => Some(JobKind::Digest),
            _ => None,
        }
    }

    pub fn all() -> [JobKind; 2] {
        [JobKind::Reminder, JobKind::Digest]
    }
}

/// A persisted scheduler job. One-shot jobs carry `fire_at` only; cron jobs
/// carry the spec and keep `fire_at` pointed at their next occurrence.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub kind: String,
    pub fire_at: Option<NaiveDateTime>,
    pub cron: Option<String>,
    pub task_id: Option<i64>,
    pub chat_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rank_orders_urgent_first_and_unknown_last() {
        assert!(priority_rank(PRIORITY_URGENT) < priority_rank(PRIORITY_NORMAL));
        assert!(priority_rank(PRIORITY_NORMAL) < priority_rank(PRIORITY_LOW));
        assert_eq!(priority_rank("someday"), 99);
    }

    #[test]
    fn shared_visibility_requires_home() {
        let mut task = Task {
            id: 1,
            chat_id: 100,
            text: "x".into(),
            priority: PRIORITY_NORMAL.into(),
            parent_category: CATEGORY_WORK.into(),
            sub_category: None,
            status: STATUS_PENDING.into(),
            reminder_time: None,
            is_shared: true,
            created_at: None,
            completed_at: None,
        };
        assert!(!task.is_shared_home());
        task.parent_category = CATEGORY_HOME.into();
        assert!(task.is_shared_home());
    }

    #[test]
    fn job_kind_tag_roundtrip() {
        for kind in JobKind::all() {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("send_reminder_job"), None);
    }
}
