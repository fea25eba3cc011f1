mod commit;
mod staged;

pub use commit::{get_commit_changes, get_commit_stats, get_commit_summary};
pub use staged::{
    get_staged_changes, get_staged_changes_stats, get_staged_changes_summary, NOTHING_STAGED,
    NOTHING_STAGED_HINT,
};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::ai::{ToolCall, ToolSpec};
use crate::git::{CommandRunner, RunnerError};

/// Text handed back to the model, plus a structured record when the tool failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub failure: Option<ToolFailure>,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failure: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub tool: String,
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// git ran and exited non-zero.
    GitExited,
    /// git could not be run at all.
    GitUnavailable,
    InvalidArguments,
    UnknownTool,
}

/// Why a single git step inside a tool failed.
pub(crate) enum GitFailure {
    Exited(String),
    Unavailable(RunnerError),
}

pub(crate) async fn git(runner: &dyn CommandRunner, args: &[&str]) -> Result<String, GitFailure> {
    match runner.run(args).await {
        Ok(output) if output.success => Ok(output.stdout),
        Ok(output) => Err(GitFailure::Exited(output.stderr)),
        Err(e) => Err(GitFailure::Unavailable(e)),
    }
}

/// Turns a tool body's result into model-facing text. `what` names the
/// thing being fetched, e.g. `commit abc123`.
pub(crate) fn finish(
    tool: GitTool,
    what: &str,
    result: Result<String, GitFailure>,
) -> ToolOutput {
    match result {
        Ok(text) => ToolOutput::success(text),
        Err(GitFailure::Exited(stderr)) => failure(
            tool,
            FailureKind::GitExited,
            format!("Error fetching {}: {}", what, stderr),
            stderr,
        ),
        Err(GitFailure::Unavailable(e)) => failure(
            tool,
            FailureKind::GitUnavailable,
            format!("Error: {}", e),
            e.to_string(),
        ),
    }
}

fn failure(tool: GitTool, kind: FailureKind, text: String, detail: String) -> ToolOutput {
    warn!(tool = tool.name(), ?kind, detail = %detail.trim(), "Tool call failed");
    ToolOutput {
        text,
        failure: Some(ToolFailure {
            tool: tool.name().to_string(),
            kind,
            detail,
        }),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CommitArgs {
    /// The git commit hash/ID to inspect
    pub commit_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitTool {
    CommitChanges,
    CommitSummary,
    CommitStats,
    StagedChanges,
    StagedChangesSummary,
    StagedChangesStats,
}

impl GitTool {
    pub const ALL: [GitTool; 6] = [
        GitTool::CommitChanges,
        GitTool::CommitSummary,
        GitTool::CommitStats,
        GitTool::StagedChanges,
        GitTool::StagedChangesSummary,
        GitTool::StagedChangesStats,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GitTool::CommitChanges => "get_commit_changes",
            GitTool::CommitSummary => "get_commit_summary",
            GitTool::CommitStats => "get_commit_stats",
            GitTool::StagedChanges => "get_staged_changes",
            GitTool::StagedChangesSummary => "get_staged_changes_summary",
            GitTool::StagedChangesStats => "get_staged_changes_stats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            GitTool::CommitChanges => {
                "Fetch the changes in a git commit using commit ID. Returns the commit \
                 metadata (author, date, message) followed by the full diff."
            }
            GitTool::CommitSummary => {
                "Get a brief summary of a commit including message, author, and files changed."
            }
            GitTool::CommitStats => {
                "Get statistics about a commit (files changed, insertions, deletions)."
            }
            GitTool::StagedChanges => {
                "Get the staged changes (changes added to index but not yet committed), \
                 including the full diff."
            }
            GitTool::StagedChangesSummary => {
                "Get a summary of staged changes including the current branch, the list of \
                 files with their status, and statistics."
            }
            GitTool::StagedChangesStats => {
                "Get detailed statistics about staged changes (insertions, deletions, files changed)."
            }
        }
    }

    fn takes_commit_id(&self) -> bool {
        matches!(
            self,
            GitTool::CommitChanges | GitTool::CommitSummary | GitTool::CommitStats
        )
    }

    pub fn spec(&self) -> ToolSpec {
        let parameters = if self.takes_commit_id() {
            parameters_schema::<CommitArgs>()
        } else {
            json!({ "type": "object", "properties": {} })
        };
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters,
        }
    }

    /// Runs the tool with model-supplied JSON arguments. Never fails: every
    /// problem is reported in the returned text.
    pub async fn invoke(&self, runner: &dyn CommandRunner, arguments: &Value) -> ToolOutput {
        let commit_id = if self.takes_commit_id() {
            match commit_id_arg(arguments) {
                Ok(id) => id,
                Err(reason) => {
                    return failure(
                        *self,
                        FailureKind::InvalidArguments,
                        format!("Error: {}", reason),
                        reason,
                    )
                }
            }
        } else {
            String::new()
        };

        match self {
            GitTool::CommitChanges => get_commit_changes(runner, &commit_id).await,
            GitTool::CommitSummary => get_commit_summary(runner, &commit_id).await,
            GitTool::CommitStats => get_commit_stats(runner, &commit_id).await,
            GitTool::StagedChanges => get_staged_changes(runner).await,
            GitTool::StagedChangesSummary => get_staged_changes_summary(runner).await,
            GitTool::StagedChangesStats => get_staged_changes_stats(runner).await,
        }
    }
}

fn commit_id_arg(arguments: &Value) -> Result<String, String> {
    let args: CommitArgs = serde_json::from_value(arguments.clone()).map_err(|e| {
        format!("invalid arguments, expected {{\"commit_id\": \"<hash>\"}}: {}", e)
    })?;
    validate_commit_id(&args.commit_id)
}

/// Trims `commit_id` and refuses values git would read as an option.
pub fn validate_commit_id(commit_id: &str) -> Result<String, String> {
    let commit_id = commit_id.trim();
    if commit_id.is_empty() {
        return Err("commit ID must not be empty".to_string());
    }
    if commit_id.starts_with('-') {
        return Err(format!("'{}' is not a valid commit ID", commit_id));
    }
    Ok(commit_id.to_string())
}

fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

/// The tools exposed to the model for one kind of run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSet {
    tools: Vec<GitTool>,
}

impl ToolSet {
    pub fn new(tools: Vec<GitTool>) -> Self {
        Self { tools }
    }

    pub fn commit() -> Self {
        Self::new(vec![
            GitTool::CommitChanges,
            GitTool::CommitSummary,
            GitTool::CommitStats,
        ])
    }

    pub fn staged() -> Self {
        Self::new(vec![
            GitTool::StagedChanges,
            GitTool::StagedChangesSummary,
            GitTool::StagedChangesStats,
        ])
    }

    pub fn tools(&self) -> &[GitTool] {
        &self.tools
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(GitTool::spec).collect()
    }

    /// Dispatches one model tool call. Tools outside this set are refused.
    pub async fn execute(&self, call: &ToolCall, runner: &dyn CommandRunner) -> ToolOutput {
        match GitTool::from_name(&call.name).filter(|tool| self.tools.contains(tool)) {
            Some(tool) => tool.invoke(runner, &call.arguments).await,
            None => {
                let text = format!(
                    "Error: unknown tool '{}'. Available tools: {}",
                    call.name,
                    self.tools
                        .iter()
                        .map(GitTool::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                warn!(tool = %call.name, "Model requested an unknown tool");
                ToolOutput {
                    text,
                    failure: Some(ToolFailure {
                        tool: call.name.clone(),
                        kind: FailureKind::UnknownTool,
                        detail: format!("unknown tool '{}'", call.name),
                    }),
                }
            }
        }
    }
}
