use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nightshift_core::{EventBus, NightshiftEvent};
use nightshift_types::{TaskResult, TaskResultStatus};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::committer::Committer;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::files::filter_existing_within;
use crate::parsing::{extract_pr_url, parse_implement, parse_plan, parse_review};
use crate::prompts::{implement_prompt, plan_prompt, review_prompt};

const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A unit of work handed to the orchestrator: the stable task type id (used
/// as the event/log key, e.g. `"docs-backfill:/a/b"`) and the human-readable
/// task description embedded into the plan prompt.
#[derive(Debug, Clone)]
pub struct OrchestratorTask {
    pub task_id: String,
    pub description: String,
}

/// Runs one task through plan → (implement → review)* with an upper bound
/// on iterations. Holds no per-task state between calls; every `run_task`
/// invocation is independent.
pub struct Orchestrator {
    max_iterations: u32,
    phase_timeout: Duration,
    events: Option<Arc<EventBus>>,
}

impl Orchestrator {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            events: None,
        }
    }

    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run_task(
        &self,
        agent: &dyn Agent,
        committer: &dyn Committer,
        task: &OrchestratorTask,
        cwd: &Path,
        cancel: CancellationToken,
    ) -> TaskResult {
        let mut logs = Vec::new();

        let plan_execution = match self
            .call_phase(agent, "plan", &task.task_id, 0, &plan_prompt(&task.description), &[], cwd, &cancel)
            .await
        {
            Ok(execution) => execution,
            Err(err) => return self.failed(&task.task_id, 0, String::new(), logs, err),
        };

        let Some(plan_output) = parse_plan(&plan_execution.stdout) else {
            return self.failed(&task.task_id, 0, plan_execution.stdout, logs, OrchestratorError::EmptyOutput);
        };
        logs.push(format!("plan: {}", plan_output.description));

        let mut plan_description = plan_output.description;
        let mut files = filter_existing_within(&plan_output.files, cwd);

        for iteration in 1..=self.max_iterations {
            let implement_execution = match self
                .call_phase(
                    agent,
                    "implement",
                    &task.task_id,
                    iteration,
                    &implement_prompt(&plan_description, iteration),
                    &files,
                    cwd,
                    &cancel,
                )
                .await
            {
                Ok(execution) => execution,
                Err(err) => return self.failed(&task.task_id, iteration, plan_description.clone(), logs, err),
            };

            let Some(implement_output) = parse_implement(&implement_execution.stdout) else {
                return self.failed(&task.task_id, iteration, plan_description.clone(), logs, OrchestratorError::EmptyOutput);
            };
            files = filter_existing_within(&implement_output.files_modified, cwd);
            logs.push(format!("implement[{iteration}]: {}", implement_output.summary));

            let review_execution = match self
                .call_phase(
                    agent,
                    "review",
                    &task.task_id,
                    iteration,
                    &review_prompt(&plan_description, &implement_output.summary, iteration),
                    &files,
                    cwd,
                    &cancel,
                )
                .await
            {
                Ok(execution) => execution,
                Err(err) => return self.failed(&task.task_id, iteration, plan_description.clone(), logs, err),
            };

            let review_output = parse_review(&review_execution.stdout);
            logs.push(format!("review[{iteration}]: passed={} {}", review_output.passed, review_output.feedback));

            if review_output.passed {
                let output_ref = extract_pr_url(&implement_execution.stdout, &implement_output.summary);
                let output_type = output_ref.as_ref().map(|_| "PR".to_string());

                match committer.commit(cwd, &task.task_id, &implement_output.summary).await {
                    Ok(branch) => logs.push(format!("committed on branch {branch}")),
                    Err(err) => {
                        tracing::error!(task_id = %task.task_id, %err, "commit failed after passing review");
                        logs.push(format!("commit failed: {err}"));
                    }
                }

                self.emit("task_completed", &task.task_id, iteration, Duration::ZERO, None);
                return TaskResult {
                    status: TaskResultStatus::Completed,
                    iterations: iteration,
                    plan: plan_description,
                    output: implement_execution.stdout,
                    logs,
                    output_type,
                    output_ref,
                };
            }

            plan_description = format!("{plan_description}\n\nPrior review feedback: {}", review_output.feedback);
        }

        self.emit("task_abandoned", &task.task_id, self.max_iterations, Duration::ZERO, None);
        TaskResult {
            status: TaskResultStatus::Abandoned,
            iterations: self.max_iterations,
            plan: plan_description,
            output: String::new(),
            logs,
            output_type: None,
            output_ref: None,
        }
    }

    async fn call_phase(
        &self,
        agent: &dyn Agent,
        phase: &str,
        task_id: &str,
        iteration: u32,
        prompt: &str,
        files: &[PathBuf],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<crate::agent::AgentExecution> {
        let started = Instant::now();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            res = tokio::time::timeout(self.phase_timeout, agent.execute(prompt, files, cwd)) => {
                match res {
                    Err(_) => Err(OrchestratorError::Timeout(self.phase_timeout)),
                    Ok(Err(err)) => Err(err),
                    Ok(Ok(execution)) if execution.exit_code != 0 => Err(OrchestratorError::NonZeroExit {
                        exit_code: execution.exit_code,
                        stderr: execution.stderr,
                    }),
                    Ok(Ok(execution)) => Ok(execution),
                }
            }
        };

        let duration = started.elapsed();
        self.emit(phase, task_id, iteration, duration, outcome.as_ref().err());
        outcome
    }

    fn emit(&self, phase: &str, task_id: &str, iteration: u32, duration: Duration, error: Option<&OrchestratorError>) {
        let Some(events) = &self.events else { return };
        let mut event = NightshiftEvent::new("orchestrator_phase");
        event.phase = Some(phase.to_string());
        event.iteration = Some(iteration);
        event.task_id = Some(task_id.to_string());
        event.duration_ms = Some(duration.as_millis() as u64);
        event.error = error.map(|e| e.to_string());
        events.publish(event);
    }

    fn failed(&self, task_id: &str, iteration: u32, plan: String, logs: Vec<String>, err: OrchestratorError) -> TaskResult {
        tracing::error!(task_id, iteration, %err, "task failed");
        self.emit("task_failed", task_id, iteration, Duration::ZERO, Some(&err));
        TaskResult {
            status: TaskResultStatus::Failed,
            iterations: iteration,
            plan,
            output: String::new(),
            logs,
            output_type: None,
            output_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CliAgent;
    use crate::committer::NoopCommitter;
    use nightshift_runtime::{CannedRunner, CannedStep};

    fn task() -> OrchestratorTask {
        OrchestratorTask {
            task_id: "docs-backfill:/a/b".to_string(),
            description: "Backfill missing module docs".to_string(),
        }
    }

    #[tokio::test]
    async fn happy_path_completes_on_first_passing_review() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CannedRunner::new(vec![
            CannedStep::ok(r#"{"steps":["a"],"files":[],"description":"plan it"}"#),
            CannedStep::ok(r#"{"files_modified":[],"summary":"did the thing"}"#),
            CannedStep::ok(r#"{"passed":true,"feedback":"lgtm","issues":[]}"#),
        ]);
        let agent = CliAgent::new("claude", "claude", vec![], runner);
        let orchestrator = Orchestrator::new(3);

        let result = orchestrator
            .run_task(&agent, &NoopCommitter, &task(), dir.path(), CancellationToken::new())
            .await;

        assert_eq!(result.status, TaskResultStatus::Completed);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn abandons_after_max_iterations_of_failing_review() {
        let dir = tempfile::tempdir().unwrap();
        let mut steps = vec![CannedStep::ok(r#"{"steps":[],"files":[],"description":"plan it"}"#)];
        for _ in 0..3 {
            steps.push(CannedStep::ok(r#"{"files_modified":[],"summary":"tried"}"#));
            steps.push(CannedStep::ok(r#"{"passed":false,"feedback":"not enough","issues":["x"]}"#));
        }
        let runner = CannedRunner::new(steps);
        let agent = CliAgent::new("claude", "claude", vec![], runner);
        let orchestrator = Orchestrator::new(3);

        let result = orchestrator
            .run_task(&agent, &NoopCommitter, &task(), dir.path(), CancellationToken::new())
            .await;

        assert_eq!(result.status, TaskResultStatus::Abandoned);
        assert_eq!(result.iterations, 3);
    }

    #[tokio::test]
    async fn planning_failure_short_circuits_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CannedRunner::new(vec![CannedStep::failed("boom")]);
        let agent = CliAgent::new("claude", "claude", vec![], runner);
        let orchestrator = Orchestrator::new(3);

        let result = orchestrator
            .run_task(&agent, &NoopCommitter, &task(), dir.path(), CancellationToken::new())
            .await;

        assert_eq!(result.status, TaskResultStatus::Failed);
        assert_eq!(result.iterations, 0);
    }

    #[tokio::test]
    async fn pr_url_is_captured_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CannedRunner::new(vec![
            CannedStep::ok(r#"{"steps":[],"files":[],"description":"plan it"}"#),
            CannedStep::ok("Created https://github.com/acme/widgets/pull/42 for review"),
            CannedStep::ok(r#"{"passed":true,"feedback":"lgtm","issues":[]}"#),
        ]);
        let agent = CliAgent::new("claude", "claude", vec![], runner);
        let orchestrator = Orchestrator::new(3);

        let result = orchestrator
            .run_task(&agent, &NoopCommitter, &task(), dir.path(), CancellationToken::new())
            .await;

        assert_eq!(result.status, TaskResultStatus::Completed);
        assert_eq!(result.output_type, Some("PR".to_string()));
        assert_eq!(result.output_ref, Some("https://github.com/acme/widgets/pull/42".to_string()));
    }

    #[tokio::test]
    async fn cancellation_returns_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CannedRunner::new(vec![CannedStep::ok("{}")]);
        let agent = CliAgent::new("claude", "claude", vec![], runner);
        let orchestrator = Orchestrator::new(3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .run_task(&agent, &NoopCommitter, &task(), dir.path(), cancel)
            .await;

        assert_eq!(result.status, TaskResultStatus::Failed);
    }
}
