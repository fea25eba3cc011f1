use super::*;
use crate::config::{AIConfig, AIProvider};
use crate::content::{extract_markdown, MessageContent};
use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

async fn setup_test_server(provider: AIProvider, model: &str) -> (ServerGuard, AIConfig) {
    let server = Server::new_async().await;
    let config = AIConfig {
        provider,
        model: model.to_string(),
        api_url: Some(format!("{}/", server.url())),
        request_timeout_secs: 5,
        ..AIConfig::default()
    };
    (server, config)
}

fn commit_tools() -> Vec<ToolSpec> {
    crate::tools::ToolSet::commit().specs()
}

#[tokio::test]
async fn test_gemini_function_call() {
    let (mut server, config) = setup_test_server(AIProvider::Gemini, "gemini-test").await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .match_header("x-goog-api-key", "test_key")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": { "parts": [{ "text": "be brief" }] },
            "contents": [{ "role": "user", "parts": [{ "text": "describe abc" }] }],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            { "text": "thinking", "thought": true },
                            { "functionCall": { "name": "get_commit_stats", "args": { "commit_id": "abc" } } }
                        ]
                    }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = GeminiClient::new(&config, "test_key".to_string()).unwrap();
    let messages = vec![Message::user("describe abc")];
    let tools = commit_tools();
    let reply = client
        .complete(&ChatRequest {
            system: "be brief",
            messages: &messages,
            tools: &tools,
        })
        .await
        .unwrap();

    assert_eq!(
        reply.tool_calls,
        vec![ToolCall::new("call_0", "get_commit_stats", json!({ "commit_id": "abc" }))]
    );
    assert!(reply.content.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_text_reply() {
    let (mut server, config) = setup_test_server(AIProvider::Gemini, "gemini-test").await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .with_status(200)
        .with_body(
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "# Changelog" }, { "text": "- Added x" }] }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = GeminiClient::new(&config, "test_key".to_string()).unwrap();
    let messages = vec![Message::user("hi")];
    let reply = client
        .complete(&ChatRequest {
            system: "",
            messages: &messages,
            tools: &[],
        })
        .await
        .unwrap();

    assert!(reply.tool_calls.is_empty());
    assert_eq!(extract_markdown(&reply.content), "# Changelog\n\n- Added x");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_empty_candidates() {
    let (mut server, config) = setup_test_server(AIProvider::Gemini, "gemini-test").await;
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .with_status(200)
        .with_body(json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string())
        .create_async()
        .await;

    let client = GeminiClient::new(&config, "test_key".to_string()).unwrap();
    let result = client
        .complete(&ChatRequest {
            system: "",
            messages: &[Message::user("hi")],
            tools: &[],
        })
        .await;

    match result {
        Err(AIError::ParseError(msg)) => assert!(msg.contains("SAFETY"), "{}", msg),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_merges_tool_results_into_one_turn() {
    let (mut server, config) = setup_test_server(AIProvider::Gemini, "gemini-test").await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .match_body(Matcher::PartialJson(json!({
            "contents": [
                { "role": "user" },
                { "role": "model" },
                {
                    "role": "user",
                    "parts": [
                        { "functionResponse": { "name": "get_commit_stats", "response": { "result": "1 file" } } },
                        { "functionResponse": { "name": "get_commit_summary", "response": { "result": "Subject: x" } } }
                    ]
                }
            ]
        })))
        .with_status(200)
        .with_body(json!({ "candidates": [{ "content": { "parts": [{ "text": "done" }] } }] }).to_string())
        .create_async()
        .await;

    let stats = ToolCall::new("a", "get_commit_stats", json!({ "commit_id": "abc" }));
    let summary = ToolCall::new("b", "get_commit_summary", json!({ "commit_id": "abc" }));
    let messages = vec![
        Message::user("describe abc"),
        ModelReply::with_tool_calls(vec![stats.clone(), summary.clone()]).into_message(),
        Message::tool_result(&stats, "1 file"),
        Message::tool_result(&summary, "Subject: x"),
    ];

    let client = GeminiClient::new(&config, "test_key".to_string()).unwrap();
    client
        .complete(&ChatRequest {
            system: "",
            messages: &messages,
            tools: &[],
        })
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_anthropic_tool_use() {
    let (mut server, config) = setup_test_server(AIProvider::Anthropic, "claude-test").await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test_key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-test",
            "system": "be brief",
            "tools": [{ "name": "get_commit_changes" }, { "name": "get_commit_summary" }, { "name": "get_commit_stats" }],
        })))
        .with_status(200)
        .with_body(
            json!({
                "content": [
                    { "type": "text", "text": "Let me look." },
                    { "type": "tool_use", "id": "toolu_1", "name": "get_commit_changes", "input": { "commit_id": "abc" } }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AnthropicClient::new(&config, "test_key".to_string()).unwrap();
    let tools = commit_tools();
    let reply = client
        .complete(&ChatRequest {
            system: "be brief",
            messages: &[Message::user("describe abc")],
            tools: &tools,
        })
        .await
        .unwrap();

    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].id, "toolu_1");
    assert_eq!(reply.tool_calls[0].arguments, json!({ "commit_id": "abc" }));
    assert_eq!(extract_markdown(&reply.content), "Let me look.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_tool_calls_with_string_arguments() {
    let (mut server, config) = setup_test_server(AIProvider::OpenAI, "gpt-test").await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test_key")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{ "role": "system", "content": "be brief" }, { "role": "user", "content": "describe abc" }],
        })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            { "id": "c1", "type": "function", "function": { "name": "get_commit_stats", "arguments": "{\"commit_id\":\"abc\"}" } },
                            { "id": "c2", "type": "function", "function": { "name": "get_commit_stats", "arguments": "{not json" } }
                        ]
                    }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenAIClient::new(&config, "test_key".to_string()).unwrap();
    let reply = client
        .complete(&ChatRequest {
            system: "be brief",
            messages: &[Message::user("describe abc")],
            tools: &commit_tools(),
        })
        .await
        .unwrap();

    assert_eq!(reply.tool_calls[0].arguments, json!({ "commit_id": "abc" }));
    assert_eq!(reply.tool_calls[1].arguments, json!("{not json"));
    assert_eq!(reply.content, MessageContent::from(""));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    for status in [401, 429, 500] {
        let (mut server, config) = setup_test_server(AIProvider::Anthropic, "claude-test").await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(status)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = AnthropicClient::new(&config, "test_key".to_string()).unwrap();
        let error = client
            .complete(&ChatRequest {
                system: "",
                messages: &[Message::user("hi")],
                tools: &[],
            })
            .await
            .unwrap_err();

        let expected = match status {
            401 => matches!(error, AIError::AuthenticationError(_)),
            429 => matches!(error, AIError::RateLimitError(_)),
            _ => matches!(&error, AIError::APIError(msg) if msg.contains("overloaded")),
        };
        assert!(expected, "status {}: {:?}", status, error);
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let (mut server, config) = setup_test_server(AIProvider::OpenAI, "gpt-test").await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let client = OpenAIClient::new(&config, "test_key".to_string()).unwrap();
    let result = client
        .complete(&ChatRequest {
            system: "",
            messages: &[Message::user("hi")],
            tools: &[],
        })
        .await;
    assert!(matches!(result, Err(AIError::ParseError(_))));
}

#[tokio::test]
async fn test_retries_only_retryable_errors() {
    let counter = AtomicU32::new(0);
    let attempts = &counter;
    let result = with_retries(&RetryConfig::new(2), move || async move {
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(AIError::NetworkError("reset".to_string()))
        } else {
            Ok("ok")
        }
    })
    .await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let counter = AtomicU32::new(0);
    let attempts = &counter;
    let result: Result<(), _> = with_retries(&RetryConfig::new(2), move || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(AIError::AuthenticationError("bad key".to_string()))
    })
    .await;
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_build_model_rejects_empty_key() {
    let result = build_model(&AIConfig::default(), "  ".to_string());
    assert!(matches!(result, Err(AIError::ValidationError(_))));

    let model = build_model(&AIConfig::default(), "key".to_string()).unwrap();
    assert_eq!(model.name(), AIProvider::Gemini.default_model());
}

#[tokio::test]
async fn test_unresponsive_server_is_a_timeout() {
    // Accepts the connection and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let config = AIConfig {
        provider: AIProvider::OpenAI,
        model: "gpt-test".to_string(),
        api_url: Some(format!("http://{}", addr)),
        request_timeout_secs: 1,
        ..AIConfig::default()
    };
    let client = OpenAIClient::new(&config, "test_key".to_string()).unwrap();
    let result = client
        .complete(&ChatRequest {
            system: "",
            messages: &[Message::user("hi")],
            tools: &[],
        })
        .await;
    server.abort();

    match result {
        Err(AIError::Timeout(timeout)) => assert_eq!(timeout, Duration::from_secs(1)),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn test_retry_delay_is_capped() {
    let retry = RetryConfig::new(10);
    assert_eq!(retry.get_delay(0), Duration::from_millis(1000));
    assert_eq!(retry.get_delay(2), Duration::from_millis(4000));
    assert_eq!(retry.get_delay(60), Duration::from_millis(10000));
    assert_eq!(retry.get_delay(u32::MAX), Duration::from_millis(10000));
}
