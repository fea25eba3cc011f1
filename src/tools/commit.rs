use super::{finish, git, GitFailure, GitTool, ToolOutput};
use crate::git::CommandRunner;

const NOT_AVAILABLE: &str = "N/A";

/// Commit metadata (fuller format) followed by the full patch.
pub async fn get_commit_changes(runner: &dyn CommandRunner, commit_id: &str) -> ToolOutput {
    let result = async {
        let info = git(runner, &["show", "--no-patch", "--format=fuller", commit_id]).await?;
        let diff = git(runner, &["show", commit_id]).await?;
        Ok::<_, GitFailure>(format!(
            "\nCommit Information:\n{}\n\nChanges:\n{}\n",
            info, diff
        ))
    }
    .await;

    finish(GitTool::CommitChanges, &format!("commit {}", commit_id), result)
}

pub async fn get_commit_summary(runner: &dyn CommandRunner, commit_id: &str) -> ToolOutput {
    let result = async {
        let log = git(
            runner,
            &["log", "-1", "--format=%H%n%an%n%ae%n%ad%n%s%n%b", commit_id],
        )
        .await?;
        let files = git(runner, &["show", "--name-status", "--format=", commit_id]).await?;
        Ok::<_, GitFailure>(format_summary(&log, &files))
    }
    .await;

    finish(
        GitTool::CommitSummary,
        &format!("commit summary {}", commit_id),
        result,
    )
}

pub async fn get_commit_stats(runner: &dyn CommandRunner, commit_id: &str) -> ToolOutput {
    let result = git(runner, &["show", "--stat", commit_id]).await;
    finish(
        GitTool::CommitStats,
        &format!("commit stats {}", commit_id),
        result,
    )
}

/// Lays out the fixed fields of a `%H%n%an%n%ae%n%ad%n%s` log line.
/// Fields past the end of the output render as `N/A`.
fn format_summary(log: &str, files: &str) -> String {
    let lines: Vec<&str> = log.trim().split('\n').collect();
    let field = |i: usize| lines.get(i).copied().unwrap_or(NOT_AVAILABLE);

    format!(
        "\nCommit ID: {}\nAuthor: {} <{}>\nDate: {}\nSubject: {}\n\nFiles Changed:\n{}\n",
        field(0),
        field(1),
        field(2),
        field(3),
        field(4),
        files
    )
}
