use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nightshift_runtime::{CommandRunner, CommandSpec};

use crate::error::OrchestratorResult;

/// One completed agent call: raw stdout/stderr, exit code, and wall-clock
/// duration. Extracting structured JSON is left to the caller; the agent
/// handle's only job is running the process and handing back its output.
#[derive(Debug, Clone)]
pub struct AgentExecution {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

/// An external AI coding agent CLI, addressed by provider name and bound to
/// a single working directory for the task's lifetime. `execute` embeds the
/// given files as a "Context Files" Markdown block on stdin ahead of the
/// prompt.
#[async_trait]
pub trait Agent: Send + Sync {
    fn provider(&self) -> &str;
    async fn execute(&self, prompt: &str, files: &[PathBuf], cwd: &Path) -> OrchestratorResult<AgentExecution>;
}

/// Builds the "Context Files" stdin block: one fenced code block per file,
/// each fence opened with the file's relative-to-cwd path as an info string.
pub fn context_files_block(files: &[PathBuf], cwd: &Path) -> String {
    if files.is_empty() {
        return String::new();
    }
    let mut block = String::from("## Context Files\n\n");
    for file in files {
        let label = file.strip_prefix(cwd).unwrap_or(file).display();
        let contents = std::fs::read_to_string(file).unwrap_or_default();
        block.push_str(&format!("```{label}\n{contents}\n```\n\n"));
    }
    block
}

/// A generic CLI-backed agent: spawns `program base_args...` in `cwd` via a
/// `CommandRunner`, writing the context-files block plus the prompt to
/// stdin. Works for any provider whose CLI reads its task from stdin and
/// writes its answer to stdout (Claude/Codex/Gemini/Copilot-style).
pub struct CliAgent<R: CommandRunner> {
    provider: String,
    program: String,
    base_args: Vec<String>,
    runner: R,
}

impl<R: CommandRunner> CliAgent<R> {
    pub fn new(provider: impl Into<String>, program: impl Into<String>, base_args: Vec<String>, runner: R) -> Self {
        Self {
            provider: provider.into(),
            program: program.into(),
            base_args,
            runner,
        }
    }
}

#[async_trait]
impl<R: CommandRunner> Agent for CliAgent<R> {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn execute(&self, prompt: &str, files: &[PathBuf], cwd: &Path) -> OrchestratorResult<AgentExecution> {
        let stdin = format!("{}{}", context_files_block(files, cwd), prompt);
        let spec = CommandSpec::new(&self.program, cwd)
            .args(self.base_args.clone())
            .stdin(stdin);

        let started = Instant::now();
        let output = self.runner.run(spec).await?;
        Ok(AgentExecution {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            duration: started.elapsed(),
        })
    }
}
