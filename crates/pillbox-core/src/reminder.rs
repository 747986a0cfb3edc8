//! Notification payload types — shared between the coordinator and every
//! dispatcher implementation.

use serde::{Deserialize, Serialize};

use crate::types::ReminderId;

/// Content handed to the dispatcher with every schedule command.
///
/// Opaque to the scheduling logic; the platform adapter renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Reminder that owns the notification; lets the tray action route the
    /// acknowledgment back to the right coordinator.
    pub reminder_id: ReminderId,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
}

impl NotificationPayload {
    pub fn new(reminder_id: ReminderId, title: &str, body: &str) -> Self {
        Self {
            reminder_id,
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}
