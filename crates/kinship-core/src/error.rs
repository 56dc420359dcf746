use thiserror::Error;

/// Top-level error type for the record model and configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid uid {value:?}: {reason}")]
    InvalidUid { value: String, reason: &'static str },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
