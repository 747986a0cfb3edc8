use thiserror::Error;

#[derive(Debug, Error)]
pub enum PillboxError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PillboxError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            PillboxError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PillboxError>;
