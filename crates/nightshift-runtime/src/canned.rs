use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{CommandOutput, CommandRunner, CommandSpec};

/// One pre-scripted response. Orchestrator tests line these up in call
/// order: plan, then (implement, review) per iteration.
#[derive(Debug, Clone)]
pub struct CannedStep {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CannedStep {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 1,
        }
    }
}

/// Returns pre-scripted responses in call order, ignoring the actual
/// `CommandSpec` it's given. Also records every spec it was called with so
/// tests can assert on the prompts/cwd/files the orchestrator constructed.
pub struct CannedRunner {
    steps: Vec<CannedStep>,
    cursor: AtomicUsize,
    calls: Mutex<Vec<CommandSpec>>,
}

impl CannedRunner {
    pub fn new(steps: Vec<CannedStep>) -> Self {
        Self {
            steps,
            cursor: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for CannedRunner {
    async fn run(&self, spec: CommandSpec) -> RuntimeResult<CommandOutput> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(spec);
        let step = self
            .steps
            .get(index)
            .ok_or(RuntimeError::NoCannedResponse(index))?;
        Ok(CommandOutput {
            stdout: step.stdout.clone(),
            stderr: step.stderr.clone(),
            exit_code: step.exit_code,
        })
    }
}
