use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reminder::NotificationPayload;
use crate::types::ReminderId;

pub const DEFAULT_REMINDER_ID: &str = "intake";
pub const DEFAULT_TITLE: &str = "Time for your intake";
pub const DEFAULT_BODY: &str = "Tap to confirm once you have taken it.";

/// Top-level config (pillbox.toml + PILLBOX_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PillboxConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reminder: ReminderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Identity and notification content of the managed reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Prefix for every store key and notification slot.
    #[serde(default = "default_reminder_id")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            id: default_reminder_id(),
            title: default_title(),
            body: default_body(),
        }
    }
}

impl ReminderConfig {
    pub fn reminder_id(&self) -> ReminderId {
        ReminderId::new(&self.id)
    }

    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload::new(self.reminder_id(), &self.title, &self.body)
    }
}

fn default_reminder_id() -> String {
    DEFAULT_REMINDER_ID.to_string()
}
fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}
fn default_body() -> String {
    DEFAULT_BODY.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pillbox/pillbox.db", home)
}

impl PillboxConfig {
    /// Load config from a TOML file with PILLBOX_* env var overrides.
    ///
    /// Falls back to ~/.pillbox/pillbox.toml when no path is given. A
    /// missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        let config: PillboxConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PILLBOX_").split("_"))
            .extract()
            .map_err(|e| crate::error::PillboxError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pillbox/pillbox.toml", home)
}
