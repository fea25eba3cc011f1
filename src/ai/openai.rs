use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    with_retries, AIError, ChatModel, ChatRequest, HttpSettings, Message, ModelReply, ToolCall,
};
use crate::config::AIConfig;
use crate::content::MessageContent;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAIClient {
    http: HttpSettings,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl OpenAIClient {
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
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        messages.extend(request.messages.iter().map(message));

        let mut body = json!({
            "model": &self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }

    fn parse_reply(response_text: &str) -> Result<ModelReply, AIError> {
        let response: OpenAIResponse = serde_json::from_str(response_text).map_err(|e| {
            AIError::ParseError(format!("Failed to parse API response: {}", e))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            AIError::ParseError(format!("Empty response from OpenAI: {}", response_text))
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                // Malformed argument JSON is passed through as a string so the
                // tool can report it back to the model.
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCall::new(call.id, call.function.name, arguments)
            })
            .collect();

        Ok(ModelReply {
            content: MessageContent::from_value(choice.message.content),
            tool_calls,
        })
    }

    async fn complete_once(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| AIError::ValidationError(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = format!("{}/v1/chat/completions", self.http.base_url);
        let response_text = self
            .http
            .post_json(&url, headers, &self.request_body(request))
            .await?;
        Self::parse_reply(&response_text)
    }
}

fn message(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut value = json!({
                "role": "assistant",
                "content": Message::assistant_text(content),
            });
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            value
        }
        Message::ToolResult {
            call_id, content, ..
        } => json!({ "role": "tool", "tool_call_id": call_id, "content": content }),
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        with_retries(&self.http.retry, || self.complete_once(request)).await
    }
}
