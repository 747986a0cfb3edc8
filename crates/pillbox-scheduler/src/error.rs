use thiserror::Error;

use crate::types::Frequency;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The policy lacks a field its frequency requires.
    #[error("Missing field `{field}` required by {frequency} policy")]
    MissingField {
        field: &'static str,
        frequency: Frequency,
    },

    /// A policy field holds an out-of-range value.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// The key-value store could not be read or written.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Stored bytes could not be decoded.
    #[error("Parse failure: {0}")]
    Parse(String),

    /// The notification dispatcher rejected a command.
    #[error("Dispatch failure: {0}")]
    Dispatch(String),
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(e: rusqlite::Error) -> Self {
        SchedulerError::Persistence(e.to_string())
    }
}

impl SchedulerError {
    /// Short error code string for callers that report failures upstream.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::MissingField { .. } => "MISSING_FIELD",
            SchedulerError::InvalidField(_) => "INVALID_FIELD",
            SchedulerError::Persistence(_) => "PERSISTENCE_FAILURE",
            SchedulerError::Parse(_) => "PARSE_FAILURE",
            SchedulerError::Dispatch(_) => "DISPATCH_FAILURE",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
