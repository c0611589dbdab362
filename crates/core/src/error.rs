use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unsupported selector: {0}")]
    Selector(String),

    #[error("Unknown node: {0}")]
    UnknownNode(usize),
}

/// Failure reported by a record sink through its returned future.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("record rejected by provider {provider}: {reason}")]
    Rejected { provider: String, reason: String },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}
