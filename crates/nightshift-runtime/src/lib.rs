//! Narrow command-runner abstraction. Agent execution is expressed through
//! `CommandRunner`, a seam narrow enough to swap a real subprocess spawn for
//! a canned response in tests without the orchestrator knowing the
//! difference.

mod canned;
mod error;
mod subprocess;

pub use canned::{CannedRunner, CannedStep};
pub use error::{RuntimeError, RuntimeResult};
pub use subprocess::SubprocessRunner;

use std::path::PathBuf;

use async_trait::async_trait;

/// One invocation of a provider CLI: program name, arguments, working
/// directory, and optional stdin (the formatted "Context Files" block plus
/// prompt, assembled by the caller).
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Raw process output: stdout/stderr captured as UTF-8 (lossily, since a
/// misbehaving agent's binary noise must never crash the orchestrator) plus
/// the exit code. The core treats stdout as authoritative; stderr is
/// diagnostic only.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The single seam the orchestrator uses to run an agent. A real
/// implementation spawns a subprocess; a test implementation returns canned
/// responses.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> RuntimeResult<CommandOutput>;
}
