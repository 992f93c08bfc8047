use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to resolve store path: {0}")]
    PathResolve(String),

    #[error("failed to create data directory: {0}")]
    DirCreate(#[source] std::io::Error),

    #[error("failed to connect to database: {0}")]
    Connect(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migrate(String),

    #[error("legacy import failed: {0}")]
    Import(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
