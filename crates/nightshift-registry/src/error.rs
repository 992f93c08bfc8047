use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("task type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown or built-in task type: {0}")]
    NotCustom(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
