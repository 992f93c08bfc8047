use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("agent process error: {0}")]
    Runtime(#[from] nightshift_runtime::RuntimeError),

    #[error("agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("agent exited {exit_code} with stderr: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("agent produced empty output")]
    EmptyOutput,

    #[error("shutdown in progress")]
    Cancelled,
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
