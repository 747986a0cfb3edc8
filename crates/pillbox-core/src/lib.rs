//! `pillbox-core` — configuration, errors and types shared by the scheduler
//! crate and the `pillbox` binary.

pub mod config;
pub mod error;
pub mod reminder;
pub mod types;

pub use config::PillboxConfig;
pub use error::{PillboxError, Result};
pub use types::ReminderId;
