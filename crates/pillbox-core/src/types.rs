use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one reminder. Every store key and notification slot owned by
/// the reminder is derived from it, so several reminders can share a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId(pub String);

impl ReminderId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The default single-reminder setup uses "intake".
    pub fn intake() -> Self {
        Self("intake".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key for one persisted field, e.g. `intake.policy`.
    pub fn key(&self, field: &str) -> String {
        format!("{}.{}", self.0, field)
    }

    /// Dispatcher id of the first notification slot.
    pub fn primary_slot(&self) -> String {
        format!("{}.primary", self.0)
    }

    /// Dispatcher id of the second slot, only armed for two-days-a-week policies.
    pub fn secondary_slot(&self) -> String {
        format!("{}.secondary", self.0)
    }

    /// Every slot the reminder may own, in arming order.
    pub fn slots(&self) -> [String; 2] {
        [self.primary_slot(), self.secondary_slot()]
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::intake()
    }
}
