use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write stdin: {0}")]
    Stdin(std::io::Error),

    #[error("failed to wait for subprocess: {0}")]
    Wait(std::io::Error),

    #[error("no canned response configured for step {0}")]
    NoCannedResponse(usize),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
