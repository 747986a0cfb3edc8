use chrono::{NaiveDate, NaiveTime, Timelike};
use clap::{Args, Parser, Subcommand};
use pillbox_scheduler::{Frequency, Patch, PolicyPatch, ReminderPolicy};

#[derive(Debug, Parser)]
#[command(name = "pillbox", version, about = "Recurring intake reminders")]
pub struct Cli {
    /// Config file (default: $PILLBOX_CONFIG, then ~/.pillbox/pillbox.toml).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace the reminder policy and arm it.
    Set(SetArgs),
    /// Change individual policy fields and re-arm.
    Edit(EditArgs),
    /// Turn the reminder off and cancel everything armed.
    Disable,
    /// Confirm today's intake.
    Ack,
    /// Re-arm a biweekly reminder after the app was in the background.
    Resume,
    /// Show the next fire time without changing anything.
    Next,
    /// Show the stored policy and bookkeeping.
    Status,
    /// List notifications currently armed in the outbox.
    Pending,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    #[arg(long, value_parser = parse_frequency)]
    pub frequency: Frequency,
    /// Local time of day, HH:MM.
    #[arg(long, value_parser = parse_time)]
    pub at: NaiveTime,
    /// ISO weekday, 1 = Monday … 7 = Sunday (weekly, biweekly).
    #[arg(long)]
    pub day: Option<u8>,
    /// Two ISO weekdays, comma separated (twice_weekly).
    #[arg(long, value_delimiter = ',')]
    pub days: Option<Vec<u8>>,
    /// Date inside the first on-week (biweekly), YYYY-MM-DD.
    #[arg(long)]
    pub anchor: Option<NaiveDate>,
}

impl SetArgs {
    pub fn into_policy(self) -> ReminderPolicy {
        ReminderPolicy {
            enabled: true,
            frequency: self.frequency,
            hour: hour_of(self.at),
            minute: minute_of(self.at),
            day_of_week: self.day,
            days_of_week: self.days,
            biweekly_anchor_date: self.anchor,
        }
    }
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,
    #[arg(long, value_parser = parse_frequency)]
    pub frequency: Option<Frequency>,
    #[arg(long, value_parser = parse_time)]
    pub at: Option<NaiveTime>,
    #[arg(long, conflicts_with = "clear_day")]
    pub day: Option<u8>,
    #[arg(long)]
    pub clear_day: bool,
    #[arg(long, value_delimiter = ',', conflicts_with = "clear_days")]
    pub days: Option<Vec<u8>>,
    #[arg(long)]
    pub clear_days: bool,
    #[arg(long, conflicts_with = "clear_anchor")]
    pub anchor: Option<NaiveDate>,
    #[arg(long)]
    pub clear_anchor: bool,
}

impl EditArgs {
    pub fn into_patch(self) -> PolicyPatch {
        let enabled = match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        PolicyPatch {
            enabled,
            frequency: self.frequency,
            hour: self.at.map(hour_of),
            minute: self.at.map(minute_of),
            day_of_week: tri_state(self.day, self.clear_day),
            days_of_week: tri_state(self.days, self.clear_days),
            biweekly_anchor_date: tri_state(self.anchor, self.clear_anchor),
        }
    }
}

fn tri_state<T>(value: Option<T>, clear: bool) -> Patch<T> {
    match (value, clear) {
        (Some(v), _) => Patch::SetTo(v),
        (None, true) => Patch::Clear,
        (None, false) => Patch::Leave,
    }
}

// NaiveTime components are always < 60, so the narrowing is lossless.
fn hour_of(t: NaiveTime) -> u8 {
    t.hour() as u8
}

fn minute_of(t: NaiveTime) -> u8 {
    t.minute() as u8
}

fn parse_frequency(s: &str) -> Result<Frequency, String> {
    s.parse()
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM ({e})"))
}
