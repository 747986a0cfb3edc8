use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `kv_store` table backing [`SqliteStore`](crate::store::SqliteStore)
/// and the `notifications` outbox written by
/// [`SqliteOutbox`](crate::dispatcher::SqliteOutbox). Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key         TEXT    NOT NULL PRIMARY KEY,
            value       BLOB    NOT NULL,   -- opaque, JSON in practice
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT    NOT NULL PRIMARY KEY,   -- slot id, e.g. intake.primary
            fire_at     TEXT    NOT NULL,               -- ISO-8601 UTC
            repeat      TEXT    NOT NULL,               -- none | time_of_day | day_of_week_and_time
            payload     TEXT    NOT NULL,               -- JSON NotificationPayload
            created_at  TEXT    NOT NULL
        ) STRICT;

        -- Platform adapters poll: SELECT … ORDER BY fire_at
        CREATE INDEX IF NOT EXISTS idx_notifications_fire_at ON notifications (fire_at);
        ",
    )?;
    Ok(())
}
