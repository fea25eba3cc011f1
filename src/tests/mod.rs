use crate::ai::{AIError, ChatModel, ChatRequest, Message, ModelReply, ToolCall};
use crate::git::{CommandRunner, GitOutput, RunnerError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};


/// Runner that answers from a fixed table keyed by the joined argument list.
#[derive(Default)]
pub(crate) struct StubRunner {
    responses: HashMap<String, GitOutput>,
    fallback: Option<GitOutput>,
    unavailable: bool,
    calls: Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, args: &str, stdout: &str) -> Self {
        self.responses.insert(args.to_string(), GitOutput::ok(stdout));
        self
    }

    pub fn fail(mut self, args: &str, stderr: &str) -> Self {
        self.responses
            .insert(args.to_string(), GitOutput::failed(stderr));
        self
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            fallback: Some(GitOutput::failed(stderr)),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, args: &[&str]) -> Result<GitOutput, RunnerError> {
        let key = args.join(" ");
        self.calls.lock().unwrap().push(key.clone());

        if self.unavailable {
            return Err(RunnerError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )));
        }
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| GitOutput::failed(format!("unexpected git call: {}", key))))
    }
}

/// Model that plays back scripted replies and records every conversation it was sent.
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, AIError>>>,
    repeat: Option<ModelReply>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: AIError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Returns `reply` on every call, forever.
    pub fn repeating(reply: ModelReply) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.repeat
            .clone()
            .ok_or_else(|| AIError::APIError("script exhausted".to_string()))
    }
}

pub(crate) fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub(crate) fn commit_call(id: &str, name: &str, commit_id: &str) -> ToolCall {
    call(id, name, json!({ "commit_id": commit_id }))
}

pub(crate) fn tool_results(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}
