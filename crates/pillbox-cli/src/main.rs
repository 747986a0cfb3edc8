use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use clap::Parser;
use pillbox_core::config::PillboxConfig;
use pillbox_scheduler::{
    PolicyPatch, ReminderCoordinator, ReminderPolicy, SqliteOutbox, SqliteStore,
};
use tracing::info;

mod args;

use args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pillbox=info,pillbox_scheduler=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // load config: --config > PILLBOX_CONFIG env > ~/.pillbox/pillbox.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("PILLBOX_CONFIG").ok());
    let config = PillboxConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        PillboxConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    pillbox_scheduler::db::init_db(&db)?;

    // store and outbox each get their own connection
    let store = Arc::new(SqliteStore::new(rusqlite::Connection::open(db_path)?)?);
    let outbox = Arc::new(SqliteOutbox::new(rusqlite::Connection::open(db_path)?)?);
    let coordinator =
        ReminderCoordinator::new(config.reminder.payload(), Local, store, outbox.clone());

    match cli.command {
        Command::Set(args) => report_next(coordinator.apply_policy(args.into_policy()).await?),
        Command::Edit(args) => report_next(coordinator.update_policy(&args.into_patch()).await?),
        Command::Disable => {
            let patch = PolicyPatch {
                enabled: Some(false),
                ..PolicyPatch::default()
            };
            report_next(coordinator.update_policy(&patch).await?);
        }
        Command::Ack => {
            if coordinator.acknowledge().await? {
                println!("Intake recorded for today.");
            } else {
                println!("Intake was already recorded today.");
            }
        }
        Command::Resume => {
            if coordinator.reconcile_on_resume().await? {
                println!("Biweekly reminder re-armed.");
            }
            report_next(coordinator.next_occurrence().await?);
        }
        Command::Next => report_next(coordinator.next_occurrence().await?),
        Command::Status => {
            let policy = coordinator.policy().await?;
            let state = coordinator.state().await?;
            print_policy(&policy);
            if let Some(at) = state.next_fire_instant {
                println!("biweekly slot  {}", format_instant(&at.with_timezone(&Local)));
            }
            if let Some(at) = state.last_acknowledged_instant {
                println!("last intake    {}", format_instant(&at.with_timezone(&Local)));
            }
            println!("days recorded  {}", state.intake_history.len());
            println!(
                "taken today    {}",
                if coordinator.taken_today().await? { "yes" } else { "no" }
            );
        }
        Command::Pending => {
            let pending = outbox.pending()?;
            if pending.is_empty() {
                println!("No notifications armed.");
            }
            for n in pending {
                println!(
                    "{:<24} {}  repeat={}",
                    n.id,
                    format_instant(&n.fire_at.with_timezone(&Local)),
                    n.repeat
                );
            }
        }
    }

    Ok(())
}

fn report_next<Tz: TimeZone>(next: Option<DateTime<Tz>>)
where
    Tz::Offset: std::fmt::Display,
{
    match next {
        Some(at) => println!("Next reminder: {}", format_instant(&at)),
        None => println!("Reminder is disabled."),
    }
}

fn format_instant<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%a %Y-%m-%d %H:%M").to_string()
}

fn print_policy(policy: &ReminderPolicy) {
    println!("enabled        {}", policy.enabled);
    println!("frequency      {}", policy.frequency);
    println!("time           {:02}:{:02}", policy.hour, policy.minute);
    if let Some(day) = policy.day_of_week {
        println!("day            {day}");
    }
    if let Some(days) = &policy.days_of_week {
        let days: Vec<String> = days.iter().map(u8::to_string).collect();
        println!("days           {}", days.join(","));
    }
    if let Some(anchor) = policy.biweekly_anchor_date {
        println!("anchor         {anchor}");
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
