use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pillbox_core::reminder::NotificationPayload;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::RepeatComponent,
};

/// The platform notification service the coordinator drives.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Arm notification `id` at `fire_at`, replacing any earlier one with the
    /// same id.
    async fn schedule_at(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        repeat: RepeatComponent,
        payload: &NotificationPayload,
    ) -> Result<()>;

    /// Disarm notification `id`. Cancelling an unknown id is a no-op.
    async fn cancel(&self, id: &str) -> Result<()>;
}

/// A notification currently armed in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub repeat: RepeatComponent,
    pub payload: NotificationPayload,
}

/// Dispatcher that records armed notifications in the `notifications` table.
///
/// A platform adapter delivers from this table; the scheduling logic never
/// needs to know which OS service sits behind it.
pub struct SqliteOutbox {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOutbox {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Every armed notification, earliest first. Malformed rows are skipped.
    pub fn pending(&self) -> Result<Vec<PendingNotification>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, fire_at, repeat, payload FROM notifications ORDER BY fire_at, id",
        )?;
        let pending = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?, // id
                    row.get::<_, String>(1)?, // fire_at
                    row.get::<_, String>(2)?, // repeat
                    row.get::<_, String>(3)?, // payload JSON
                ))
            })?
            .filter_map(|r| {
                let (id, fire_at, repeat, payload) = r.ok()?;
                let parsed = (|| {
                    Some(PendingNotification {
                        fire_at: DateTime::parse_from_rfc3339(&fire_at)
                            .ok()?
                            .with_timezone(&Utc),
                        repeat: repeat.parse().ok()?,
                        payload: serde_json::from_str(&payload).ok()?,
                        id: id.clone(),
                    })
                })();
                if parsed.is_none() {
                    warn!(notification_id = %id, "skipping malformed outbox row");
                }
                parsed
            })
            .collect();
        Ok(pending)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SchedulerError::Dispatch("outbox lock poisoned".to_string()))
    }
}

fn dispatch_err(e: rusqlite::Error) -> SchedulerError {
    SchedulerError::Dispatch(e.to_string())
}

#[async_trait]
impl NotificationDispatcher for SqliteOutbox {
    async fn schedule_at(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        repeat: RepeatComponent,
        payload: &NotificationPayload,
    ) -> Result<()> {
        let payload_json =
            serde_json::to_string(payload).map_err(|e| SchedulerError::Dispatch(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO notifications (id, fire_at, repeat, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                id,
                fire_at.to_rfc3339(),
                repeat.to_string(),
                payload_json,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(dispatch_err)?;
        info!(notification_id = %id, %fire_at, %repeat, "notification armed");
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM notifications WHERE id = ?1", [id])
            .map_err(dispatch_err)?;
        if n > 0 {
            info!(notification_id = %id, "notification cancelled");
        }
        Ok(())
    }
}
