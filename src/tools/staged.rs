use super::{finish, git, GitFailure, GitTool, ToolOutput};
use crate::git::CommandRunner;

pub const NOTHING_STAGED_HINT: &str =
    "No staged changes found. Please stage your changes using 'git add' first.";
pub const NOTHING_STAGED: &str = "No staged changes found.";

pub async fn get_staged_changes(runner: &dyn CommandRunner) -> ToolOutput {
    let result = async {
        let names = git(runner, &["diff", "--cached", "--name-only"]).await?;
        if names.trim().is_empty() {
            return Ok(NOTHING_STAGED_HINT.to_string());
        }

        let diff = git(runner, &["diff", "--cached"]).await?;
        Ok::<_, GitFailure>(format!("\nStaged Changes (Ready to Commit):\n\n{}\n", diff))
    }
    .await;

    finish(GitTool::StagedChanges, "staged changes", result)
}

pub async fn get_staged_changes_summary(runner: &dyn CommandRunner) -> ToolOutput {
    let result = async {
        let status = git(runner, &["diff", "--cached", "--name-status"]).await?;
        if status.trim().is_empty() {
            return Ok(NOTHING_STAGED.to_string());
        }

        let stats = git(runner, &["diff", "--cached", "--stat"]).await?;
        let branch = git(runner, &["branch", "--show-current"]).await?;
        Ok::<_, GitFailure>(format!(
            "\nStaged Changes Summary:\nBranch: {}\n\nFiles Status:\n{}\n\nStatistics:\n{}\n",
            branch.trim(),
            status,
            stats
        ))
    }
    .await;

    finish(
        GitTool::StagedChangesSummary,
        "staged changes summary",
        result,
    )
}

pub async fn get_staged_changes_stats(runner: &dyn CommandRunner) -> ToolOutput {
    let result = async {
        let numstat = git(runner, &["diff", "--cached", "--numstat"]).await?;
        if numstat.trim().is_empty() {
            return Ok(NOTHING_STAGED.to_string());
        }

        let stats = git(runner, &["diff", "--cached", "--stat"]).await?;
        Ok::<_, GitFailure>(format!(
            "\nStaged Changes Statistics:\n\nDetailed Line Changes:\n{}\n\nSummary:\n{}\n",
            numstat, stats
        ))
    }
    .await;

    finish(GitTool::StagedChangesStats, "staged changes stats", result)
}
