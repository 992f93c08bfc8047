use std::path::Path;

use async_trait::async_trait;
use nightshift_runtime::{CommandRunner, CommandSpec};

/// Commits the agent's changes after a successful review. A commit failure
/// is logged but never changes an otherwise-`Completed` task.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, cwd: &Path, task_id: &str, summary: &str) -> Result<String, String>;
}

/// No-op committer for tests and for tasks that don't produce a commit
/// (analysis/options categories).
pub struct NoopCommitter;

#[async_trait]
impl Committer for NoopCommitter {
    async fn commit(&self, _cwd: &Path, _task_id: &str, _summary: &str) -> Result<String, String> {
        Ok("main".to_string())
    }
}

/// Stages and commits all changes via `git`, returning the current branch
/// name on success.
pub struct GitCommitter<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GitCommitter<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    async fn run_git(&self, cwd: &Path, args: Vec<&str>) -> Result<String, String> {
        let spec = CommandSpec::new("git", cwd).args(args);
        let output = self.runner.run(spec).await.map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.stderr);
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl<R: CommandRunner> Committer for GitCommitter<R> {
    async fn commit(&self, cwd: &Path, task_id: &str, summary: &str) -> Result<String, String> {
        self.run_git(cwd, vec!["add", "-A"]).await?;
        let message = format!("nightshift: {task_id}\n\n{summary}");
        self.run_git(cwd, vec!["commit", "-m", &message]).await?;
        let branch = self.run_git(cwd, vec!["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(branch.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_committer_always_succeeds() {
        let committer = NoopCommitter;
        let result = committer.commit(Path::new("/tmp"), "docs-backfill:/a/b", "did things").await;
        assert!(result.is_ok());
    }
}
