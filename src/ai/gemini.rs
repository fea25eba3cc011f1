use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    with_retries, AIError, ChatModel, ChatRequest, HttpSettings, Message, ModelReply, ToolCall,
};
use crate::config::AIConfig;
use crate::content::{ContentBlock, MessageContent};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    http: HttpSettings,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    call_counter: AtomicUsize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

impl GeminiClient {
    pub fn new(config: &AIConfig, api_key: String) -> Result<Self, AIError> {
        Ok(Self {
            http: HttpSettings::new(config, DEFAULT_BASE_URL)?,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            call_counter: AtomicUsize::new(0),
        })
    }

    fn request_body(&self, request: &ChatRequest<'_>) -> Value {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                let mut decl = json!({
                    "name": tool.name,
                    "description": tool.description,
                });
                // Gemini rejects object schemas with no properties.
                if tool.has_parameters() {
                    decl["parameters"] = tool.parameters.clone();
                }
                decl
            })
            .collect();

        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": contents(request.messages),
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });
        if !declarations.is_empty() {
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }

    fn parse_reply(&self, response_text: &str) -> Result<ModelReply, AIError> {
        let response: GeminiResponse = serde_json::from_str(response_text).map_err(|e| {
            AIError::ParseError(format!(
                "Failed to parse Gemini response: {} - Raw response: {}",
                e, response_text
            ))
        })?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(AIError::ParseError(format!(
                "Empty response from Gemini: {}",
                reason
            )));
        };

        let mut blocks = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.get("thought").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            if let Some(call) = part.get("functionCall") {
                let id = match call.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => format!("call_{}", self.call_counter.fetch_add(1, Ordering::Relaxed)),
                };
                tool_calls.push(ToolCall {
                    id,
                    name: call
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
                    signature: part
                        .get("thoughtSignature")
                        .and_then(Value::as_str)
                        .map(String::from),
                });
            } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                blocks.push(ContentBlock::text(text));
            } else {
                blocks.push(ContentBlock::from_value(part));
            }
        }

        Ok(ModelReply {
            content: MessageContent::Blocks(blocks),
            tool_calls,
        })
    }

    async fn complete_once(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AIError::ValidationError(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.http.base_url, self.model
        );
        let response_text = self
            .http
            .post_json(&url, headers, &self.request_body(request))
            .await?;
        self.parse_reply(&response_text)
    }
}

/// Converts the conversation into Gemini `contents`. Consecutive tool results
/// are merged into a single user turn.
fn contents(messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    for message in messages {
        if !matches!(message, Message::ToolResult { .. }) && !pending_responses.is_empty() {
            let parts = std::mem::take(&mut pending_responses);
            contents.push(json!({ "role": "user", "parts": parts }));
        }
        match message {
            Message::User { content } => {
                contents.push(json!({ "role": "user", "parts": [{ "text": content }] }));
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();
                if let Some(text) = Message::assistant_text(content) {
                    parts.push(json!({ "text": text }));
                }
                for call in tool_calls {
                    let mut part = json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    });
                    if let Some(signature) = &call.signature {
                        part["thoughtSignature"] = json!(signature);
                    }
                    parts.push(part);
                }
                if parts.is_empty() {
                    parts.push(json!({ "text": "" }));
                }
                contents.push(json!({ "role": "model", "parts": parts }));
            }
            Message::ToolResult { name, content, .. } => {
                pending_responses.push(json!({
                    "functionResponse": { "name": name, "response": { "result": content } }
                }));
            }
        }
    }
    if !pending_responses.is_empty() {
        contents.push(json!({ "role": "user", "parts": pending_responses }));
    }
    contents
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        with_retries(&self.http.retry, || self.complete_once(request)).await
    }
}
