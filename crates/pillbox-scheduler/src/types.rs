use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How often the reminder recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every day at the configured time.
    Daily,
    /// Once a week on `day_of_week`.
    Weekly,
    /// On the two weekdays in `days_of_week`.
    TwiceWeekly,
    /// On `day_of_week` every other week.
    Biweekly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::TwiceWeekly => "twice_weekly",
            Frequency::Biweekly => "biweekly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "twice_weekly" | "twice-weekly" => Ok(Frequency::TwiceWeekly),
            "biweekly" => Ok(Frequency::Biweekly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// The user's reminder settings. Replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    pub enabled: bool,
    pub frequency: Frequency,
    /// Local wall-clock hour, 0..=23.
    pub hour: u8,
    /// Local wall-clock minute, 0..=59.
    pub minute: u8,
    /// ISO weekday (1 = Monday … 7 = Sunday). Weekly and Biweekly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    /// Exactly two distinct ISO weekdays. TwiceWeekly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// Any date inside the first on-week. Biweekly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biweekly_anchor_date: Option<NaiveDate>,
}

impl Default for ReminderPolicy {
    /// Disabled daily reminder at 09:00; used whenever nothing valid is stored.
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::Daily,
            hour: 9,
            minute: 0,
            day_of_week: None,
            days_of_week: None,
            biweekly_anchor_date: None,
        }
    }
}

impl ReminderPolicy {
    pub fn daily(hour: u8, minute: u8) -> Self {
        Self {
            enabled: true,
            frequency: Frequency::Daily,
            hour,
            minute,
            ..Self::default()
        }
    }

    pub fn weekly(day_of_week: u8, hour: u8, minute: u8) -> Self {
        Self {
            day_of_week: Some(day_of_week),
            frequency: Frequency::Weekly,
            ..Self::daily(hour, minute)
        }
    }

    pub fn twice_weekly(days: [u8; 2], hour: u8, minute: u8) -> Self {
        Self {
            days_of_week: Some(days.to_vec()),
            frequency: Frequency::TwiceWeekly,
            ..Self::daily(hour, minute)
        }
    }

    pub fn biweekly(day_of_week: u8, hour: u8, minute: u8, anchor: Option<NaiveDate>) -> Self {
        Self {
            day_of_week: Some(day_of_week),
            biweekly_anchor_date: anchor,
            frequency: Frequency::Biweekly,
            ..Self::daily(hour, minute)
        }
    }

    /// Return a copy with `patch` applied. Absent patch fields keep their value.
    pub fn patched(&self, patch: &PolicyPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            frequency: patch.frequency.unwrap_or(self.frequency),
            hour: patch.hour.unwrap_or(self.hour),
            minute: patch.minute.unwrap_or(self.minute),
            day_of_week: patch.day_of_week.clone().apply(self.day_of_week),
            days_of_week: patch.days_of_week.clone().apply(self.days_of_week.clone()),
            biweekly_anchor_date: patch
                .biweekly_anchor_date
                .clone()
                .apply(self.biweekly_anchor_date),
        }
    }
}

/// Tri-state edit of an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Patch<T> {
    /// Keep whatever is currently stored.
    #[default]
    Leave,
    /// Replace with the given value.
    SetTo(T),
    /// Remove the value.
    Clear,
}

impl<T> Patch<T> {
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Leave => current,
            Patch::SetTo(v) => Some(v),
            Patch::Clear => None,
        }
    }

    pub fn is_leave(&self) -> bool {
        matches!(self, Patch::Leave)
    }
}

/// Partial update of a [`ReminderPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub hour: Option<u8>,
    #[serde(default)]
    pub minute: Option<u8>,
    #[serde(default)]
    pub day_of_week: Patch<u8>,
    #[serde(default)]
    pub days_of_week: Patch<Vec<u8>>,
    #[serde(default)]
    pub biweekly_anchor_date: Patch<NaiveDate>,
}

/// Bookkeeping the coordinator persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Last one-shot instant armed for the biweekly slot.
    pub next_fire_instant: Option<DateTime<Utc>>,
    /// Most recent confirmed intake.
    pub last_acknowledged_instant: Option<DateTime<Utc>>,
    /// One entry per local calendar day an intake was recorded. Only grows.
    pub intake_history: BTreeSet<NaiveDate>,
}

impl ScheduleState {
    /// Record an intake on `day`. Returns `false` when the day was already present.
    pub fn record_intake(&mut self, day: NaiveDate) -> bool {
        self.intake_history.insert(day)
    }

    pub fn parity(&self) -> ParityContext {
        ParityContext {
            last_acknowledged: self.last_acknowledged_instant,
        }
    }
}

/// Prior state the resolver reads to pick the on-week of a biweekly
/// reminder that has no anchor date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParityContext {
    pub last_acknowledged: Option<DateTime<Utc>>,
}

/// How the dispatcher should repeat a notification after its first delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatComponent {
    /// One-shot.
    None,
    /// Repeat every day at the same wall-clock time.
    TimeOfDay,
    /// Repeat every week on the same weekday and time.
    DayOfWeekAndTime,
}

impl std::fmt::Display for RepeatComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepeatComponent::None => "none",
            RepeatComponent::TimeOfDay => "time_of_day",
            RepeatComponent::DayOfWeekAndTime => "day_of_week_and_time",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RepeatComponent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(RepeatComponent::None),
            "time_of_day" => Ok(RepeatComponent::TimeOfDay),
            "day_of_week_and_time" => Ok(RepeatComponent::DayOfWeekAndTime),
            other => Err(format!("unknown repeat component: {other}")),
        }
    }
}

/// One notification the coordinator should arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing<Tz: TimeZone> {
    pub instant: DateTime<Tz>,
    pub repeat: RepeatComponent,
}

/// Everything the resolver decided for one policy. Only
/// [`Frequency::TwiceWeekly`] fills `secondary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirePlan<Tz: TimeZone> {
    pub frequency: Frequency,
    pub primary: Firing<Tz>,
    pub secondary: Option<Firing<Tz>>,
}

impl<Tz: TimeZone> FirePlan<Tz> {
    pub fn firings(&self) -> impl Iterator<Item = &Firing<Tz>> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    /// The instant shown to the user as "next reminder".
    pub fn earliest(&self) -> DateTime<Tz> {
        match &self.secondary {
            Some(second) if second.instant < self.primary.instant => second.instant.clone(),
            _ => self.primary.instant.clone(),
        }
    }
}
