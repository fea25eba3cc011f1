use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final (or intermediate) content of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    PlainText(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Code {
        text: String,
        language: Option<String>,
    },
    /// Any block type we don't render specially. `raw` keeps the block as received.
    Other {
        kind: String,
        text: Option<String>,
        raw: Value,
    },
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::PlainText(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::PlainText(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::PlainText(text)
    }
}

impl MessageContent {
    /// Builds content from whatever JSON shape a provider returned. Never fails.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => MessageContent::PlainText(text),
            Value::Array(items) => {
                MessageContent::Blocks(items.into_iter().map(ContentBlock::from_value).collect())
            }
            Value::Null => MessageContent::PlainText(String::new()),
            other => MessageContent::PlainText(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::PlainText(text) => text.trim().is_empty(),
            MessageContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = &value else {
            return ContentBlock::Other {
                kind: String::new(),
                text: None,
                raw: value,
            };
        };

        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let text = map.get("text").map(|t| match t {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        if kind == "text" {
            ContentBlock::Text {
                text: text.unwrap_or_default(),
            }
        } else if kind == "code" {
            ContentBlock::Code {
                text: text.unwrap_or_default(),
                language: map
                    .get("language")
                    .and_then(Value::as_str)
                    .filter(|lang| !lang.is_empty())
                    .map(String::from),
            }
        } else {
            ContentBlock::Other {
                kind,
                text,
                raw: value,
            }
        }
    }
}

/// Flattens message content into a single markdown document.
pub fn extract_markdown(content: &MessageContent) -> String {
    match content {
        MessageContent::PlainText(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(render_block)
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::Code {
            text,
            language: Some(language),
        } => format!("```{}\n{}\n```", language, text),
        ContentBlock::Code {
            text,
            language: None,
        } => format!("```\n{}\n```", text),
        ContentBlock::Other {
            text: Some(text), ..
        } => text.clone(),
        ContentBlock::Other { raw, .. } => match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
