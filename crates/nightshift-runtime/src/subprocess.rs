use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{CommandOutput, CommandRunner, CommandSpec};

/// Spawns the provider CLI as a real child process. Stdin (if any) is
/// written then the handle is dropped so the child sees EOF; stdout/stderr
/// are captured in full. Timeouts and cancellation are the caller's
/// responsibility (the orchestrator wraps `run` in `tokio::time::timeout`
/// and races it against a `CancellationToken`), since the per-phase timeout
/// is an orchestrator-level policy, not a property of "how to run a
/// process".
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubprocessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: CommandSpec) -> RuntimeResult<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command.spawn().map_err(|source| RuntimeError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        if let Some(stdin_text) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(stdin_text.as_bytes())
                    .await
                    .map_err(RuntimeError::Stdin)?;
            }
        } else {
            drop(child.stdin.take());
        }

        let output = child.wait_with_output().await.map_err(RuntimeError::Wait)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
