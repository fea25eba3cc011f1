use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::agent::{prompts, AgentError, AgentLoop, AgentOutcome, DEFAULT_MAX_ITERATIONS};
use crate::ai::ChatModel;
use crate::changelog::{ChangelogDocument, ChangelogTarget, ChangelogWriter, OutputError};
use crate::content::extract_markdown;
use crate::git::CommandRunner;
use crate::tools::ToolSet;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The changelog was generated but could not be saved.
    #[error("{source}")]
    Output {
        #[source]
        source: OutputError,
        document: ChangelogDocument,
    },
}

#[derive(Debug, Clone)]
pub struct GeneratedChangelog {
    pub document: ChangelogDocument,
    pub path: PathBuf,
    pub outcome: AgentOutcome,
}

pub struct ChangelogGenerator {
    model: Arc<dyn ChatModel>,
    writer: ChangelogWriter,
    max_iterations: usize,
}

impl ChangelogGenerator {
    pub fn new(model: Arc<dyn ChatModel>, writer: ChangelogWriter) -> Self {
        Self {
            model,
            writer,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn writer(&self) -> &ChangelogWriter {
        &self.writer
    }

    fn agent_for(&self, target: &ChangelogTarget) -> AgentLoop {
        let (tools, system_prompt) = if target.is_staged() {
            (ToolSet::staged(), prompts::STAGED_SYSTEM_PROMPT)
        } else {
            (ToolSet::commit(), prompts::COMMIT_SYSTEM_PROMPT)
        };
        AgentLoop::new(self.model.clone(), tools, system_prompt)
            .with_max_iterations(self.max_iterations)
    }

    /// Runs the agent for `target` against `runner` and saves the result.
    pub async fn generate(
        &self,
        target: &ChangelogTarget,
        runner: &dyn CommandRunner,
    ) -> Result<GeneratedChangelog, GenerateError> {
        let task = match target {
            ChangelogTarget::Commit(commit_id) => prompts::commit_task(commit_id),
            ChangelogTarget::Staged(_) => prompts::staged_task(),
        };

        let agent = self.agent_for(target);
        let outcome = agent.run(&target.thread_id(), &task, runner).await?;

        let document = ChangelogDocument::new(target.clone(), extract_markdown(&outcome.content));
        let path = match self.writer.write(&document) {
            Ok(path) => path,
            Err(source) => return Err(GenerateError::Output { source, document }),
        };

        info!(
            thread = %target.thread_id(),
            rounds = outcome.rounds,
            failures = outcome.tool_failures.len(),
            "Changelog generated"
        );
        Ok(GeneratedChangelog {
            document,
            path,
            outcome,
        })
    }
}
