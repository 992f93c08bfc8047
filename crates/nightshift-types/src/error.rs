use thiserror::Error;

/// Top-level error kind aggregating every component's typed error.
/// Component crates define their own narrower error enums and convert into this one
/// at the boundary where the worker process needs a single type to log or report.
#[derive(Error, Debug)]
pub enum NightshiftError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("usage read error: {0}")]
    UsageRead(String),

    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("review failed, task abandoned: {0}")]
    ReviewFailedAbandon(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<String> for NightshiftError {
    fn from(err: String) -> Self {
        NightshiftError::Config(err)
    }
}

pub type NightshiftResult<T> = Result<T, NightshiftError>;
