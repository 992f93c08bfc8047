use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum UsageReadError {
    #[error("usage file not found: {0}")]
    FileNotFound(String),

    #[error("usage file unreadable: {0}")]
    FileRead(String),

    #[error("usage transcript unparseable: {0}")]
    Parse(String),

    #[error("usage HTTP request failed: {0}")]
    Http(String),

    #[error("usage scrape timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("usage percentage out of range: {0}")]
    OutOfRange(f64),

    #[error("no adapter registered for provider {0}")]
    UnknownProvider(String),
}

pub type UsageResult<T> = Result<T, UsageReadError>;
