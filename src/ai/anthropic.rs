use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    with_retries, AIError, ChatModel, ChatRequest, HttpSettings, Message, ModelReply, ToolCall,
};
use crate::config::AIConfig;
use crate::content::MessageContent;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicClient {
    http: HttpSettings,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<Value>,
}

impl AnthropicClient {
    pub fn new(config: &AIConfig, api_key: String) -> Result<Self, AIError> {
        Ok(Self {
            http: HttpSettings::new(config, DEFAULT_BASE_URL)?,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, request: &ChatRequest<'_>) -> Value {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();

        let mut body = json!({
            "model": &self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": messages(request.messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }

    fn parse_reply(response_text: &str) -> Result<ModelReply, AIError> {
        let response: AnthropicResponse = serde_json::from_str(response_text).map_err(|e| {
            AIError::ParseError(format!(
                "Failed to parse Anthropic response: {} - Raw response: {}",
                e, response_text
            ))
        })?;

        let mut blocks = Vec::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                tool_calls.push(ToolCall::new(
                    block.get("id").and_then(Value::as_str).unwrap_or_default(),
                    block.get("name").and_then(Value::as_str).unwrap_or_default(),
                    block.get("input").cloned().unwrap_or_else(|| json!({})),
                ));
            } else {
                blocks.push(block);
            }
        }

        Ok(ModelReply {
            content: MessageContent::from_value(Value::Array(blocks)),
            tool_calls,
        })
    }

    async fn complete_once(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        let mut headers = HeaderMap::new();
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AIError::ValidationError(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = format!("{}/v1/messages", self.http.base_url);
        let response_text = self
            .http
            .post_json(&url, headers, &self.request_body(request))
            .await?;
        Self::parse_reply(&response_text)
    }
}

fn messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    for message in messages {
        if !matches!(message, Message::ToolResult { .. }) && !pending_results.is_empty() {
            out.push(json!({ "role": "user", "content": std::mem::take(&mut pending_results) }));
        }
        match message {
            Message::User { content } => {
                out.push(json!({ "role": "user", "content": content }));
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if let Some(text) = Message::assistant_text(content) {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                out.push(json!({ "role": "assistant", "content": blocks }));
            }
            Message::ToolResult {
                call_id, content, ..
            } => {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": call_id,
                    "content": content,
                }));
            }
        }
    }
    if !pending_results.is_empty() {
        out.push(json!({ "role": "user", "content": pending_results }));
    }
    out
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        with_retries(&self.http.retry, || self.complete_once(request)).await
    }
}
