//! `pillbox-scheduler` — recurring intake reminders with persisted parity state.
//!
//! # Overview
//!
//! [`schedule::resolve`] turns a [`ReminderPolicy`] and the current instant
//! into concrete fire instants. The [`engine::ReminderCoordinator`] arms
//! them through a [`NotificationDispatcher`] and keeps its bookkeeping in a
//! [`KeyValueStore`], so biweekly alternation survives restarts.
//!
//! # Frequencies
//!
//! | Variant       | Armed as                                  |
//! |---------------|-------------------------------------------|
//! | `Daily`       | one slot, repeating at the time of day    |
//! | `Weekly`      | one slot, repeating on weekday and time   |
//! | `TwiceWeekly` | two slots, each repeating weekly          |
//! | `Biweekly`    | one one-shot slot, re-armed on ack/resume |

pub mod clock;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use dispatcher::{NotificationDispatcher, PendingNotification, SqliteOutbox};
pub use engine::ReminderCoordinator;
pub use error::{Result, SchedulerError};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::{
    FirePlan, Firing, Frequency, ParityContext, Patch, PolicyPatch, ReminderPolicy,
    RepeatComponent, ScheduleState,
};
