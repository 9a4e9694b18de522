use anyhow::{Context, Result};
use tracing::{info, warn};

/// Default digest trigger: 09:00 local, every day (sec min hour dom mon dow).
pub const DEFAULT_DIGEST_CRON: &str = "0 0 9 * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub db_path: String,
    /// Chat ids that always receive the daily digest, even with zero
    /// personal tasks. Empty means no extra fan-out beyond task owners.
    pub allowed_users: Vec<i64>,
    pub digest_cron: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .context("BOT_TOKEN is missing or empty")?;

        let db_path = std::env::var("DATABASE").unwrap_or_else(|_| "./tasks.db".to_string());

        let allowed_users = match std::env::var("ALLOWED_USERS") {
            Ok(raw) => parse_allowed_users(&raw),
            Err(_) => Vec::new(),
        };

        let digest_cron =
            std::env::var("DIGEST_CRON").unwrap_or_else(|_| DEFAULT_DIGEST_CRON.to_string());

        let cfg = Self {
            bot_token,
            db_path,
            allowed_users,
            digest_cron,
        };
        info!("BOT_TOKEN: {}", cfg.masked_token());
        info!("DATABASE: {}", cfg.db_path);
        Ok(cfg)
    }

    pub fn masked_token(&self) -> String {
        let t = &self.bot_token;
        if t.len() <= 10 {
            "*".repeat(t.len())
        } else {
            format!("{}...{}", &t[..5], &t[t.len() - 5..])
        }
    }
}

fn parse_allowed_users(raw: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => warn!("Ignoring non-numeric ALLOWED_USERS entry: {}", part),
        }
    }
    ids
}
