pub mod prompts;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ai::{AIError, ChatModel, ChatRequest, Message};
use crate::content::MessageContent;
use crate::git::CommandRunner;
use crate::tools::{ToolFailure, ToolSet};

pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingModelResponse,
    ExecutingTools,
    Done,
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Model(#[from] AIError),

    #[error("tool loop exceeded: no final answer after {max_iterations} model round-trips")]
    ToolLoopExceeded { max_iterations: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub content: MessageContent,
    /// Number of tool round-trips before the final answer.
    pub rounds: usize,
    pub tool_calls: usize,
    pub tool_failures: Vec<ToolFailure>,
}

/// In-memory conversation history keyed by thread ID.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, thread_id: &str) -> Vec<Message> {
        self.threads
            .lock()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn save(&self, thread_id: &str, messages: &[Message]) {
        self.threads
            .lock()
            .await
            .insert(thread_id.to_string(), messages.to_vec());
    }

    pub async fn thread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Drives one tool-use conversation with the model until it stops asking for tools.
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    tools: ToolSet,
    system_prompt: String,
    max_iterations: usize,
    checkpoints: CheckpointStore,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolSet,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            checkpoints: CheckpointStore::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub async fn run(
        &self,
        thread_id: &str,
        task: &str,
        runner: &dyn CommandRunner,
    ) -> Result<AgentOutcome, AgentError> {
        let mut messages = self.checkpoints.load(thread_id).await;
        messages.push(Message::user(task));

        let specs = self.tools.specs();
        let mut state = AgentState::AwaitingModelResponse;
        let mut rounds = 0;
        let mut tool_calls = 0;
        let mut tool_failures = Vec::new();

        info!(thread = thread_id, model = self.model.name(), "Starting agent run");

        for iteration in 1..=self.max_iterations {
            let request = ChatRequest {
                system: &self.system_prompt,
                messages: &messages,
                tools: &specs,
            };
            let reply = match self.model.complete(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.checkpoints.save(thread_id, &messages).await;
                    return Err(e.into());
                }
            };

            if reply.tool_calls.is_empty() {
                transition(&mut state, AgentState::Done, thread_id);
                let content = reply.content.clone();
                messages.push(reply.into_message());
                self.checkpoints.save(thread_id, &messages).await;

                info!(thread = thread_id, rounds, tool_calls, "Agent produced final answer");
                return Ok(AgentOutcome {
                    content,
                    rounds,
                    tool_calls,
                    tool_failures,
                });
            }

            // Tool results from the last allowed round would never reach the model.
            if iteration == self.max_iterations {
                messages.push(reply.into_message());
                break;
            }

            transition(&mut state, AgentState::ExecutingTools, thread_id);
            let calls = reply.tool_calls.clone();
            messages.push(reply.into_message());

            for call in &calls {
                debug!(
                    thread = thread_id,
                    tool = %call.name,
                    arguments = %call.arguments,
                    "Executing tool"
                );
                let output = self.tools.execute(call, runner).await;
                if let Some(failure) = output.failure {
                    tool_failures.push(failure);
                }
                messages.push(Message::tool_result(call, output.text));
                tool_calls += 1;
            }

            rounds += 1;
            transition(&mut state, AgentState::AwaitingModelResponse, thread_id);
            self.checkpoints.save(thread_id, &messages).await;
        }

        self.checkpoints.save(thread_id, &messages).await;
        Err(AgentError::ToolLoopExceeded {
            max_iterations: self.max_iterations,
        })
    }
}

fn transition(state: &mut AgentState, next: AgentState, thread_id: &str) {
    debug!(thread = thread_id, from = ?*state, to = ?next, "Agent state transition");
    *state = next;
}
