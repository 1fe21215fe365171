//! Unit tests for chat-completion types.
//!
//! Tests request serialization, response deserialization,
//! and the JSON fence stripping used by every completion parser.

use super::*;
use serde_json::json;

// Message tests
#[test]
fn test_message_system() {
    let msg = Message::system("You are an interviewer");
    assert_eq!(msg.role, MessageRole::System);
    assert_eq!(msg.content, "You are an interviewer");
}

#[test]
fn test_message_user() {
    let msg = Message::user("Hello, world!");
    assert_eq!(msg.role, MessageRole::User);
}

#[test]
fn test_message_role_serializes_lowercase() {
    let value = serde_json::to_value(Message::system("ok")).unwrap();
    assert_eq!(value, json!({"role": "system", "content": "ok"}));

    let reply: Message = serde_json::from_value(json!({"role": "assistant", "content": "hi"})).unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
}

// ChatRequest tests
#[test]
fn test_chat_request_new_skips_unset_options() {
    let req = ChatRequest::new("llama", vec![Message::user("test")]);
    let value = serde_json::to_value(&req).unwrap();

    assert_eq!(value["model"], "llama");
    assert_eq!(value["messages"].as_array().unwrap().len(), 1);
    assert!(value.get("temperature").is_none());
    assert!(value.get("max_tokens").is_none());
    assert!(value.get("response_format").is_none());
}

#[test]
fn test_chat_request_builders() {
    let req = ChatRequest::new("llama", vec![])
        .with_temperature(0.2)
        .with_max_tokens(800)
        .with_json_output();
    let value = serde_json::to_value(&req).unwrap();

    assert_eq!(value["temperature"], 0.2);
    assert_eq!(value["max_tokens"], 800);
    assert_eq!(value["response_format"]["type"], "json_object");
}

// ChatResponse tests
#[test]
fn test_chat_response_content() {
    let response: ChatResponse = serde_json::from_value(json!({
        "id": "chatcmpl-1",
        "model": "llama",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "{\"score\": 7}"}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .unwrap();

    assert_eq!(response.content(), Some("{\"score\": 7}"));
    assert_eq!(response.usage.unwrap().total_tokens, Some(15));
}

#[test]
fn test_chat_response_without_choices() {
    let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
    assert!(response.content().is_none());
}

// extract_json tests
#[test]
fn test_extract_json_plain() {
    assert_eq!(extract_json("  {\"a\": 1} "), "{\"a\": 1}");
}

#[test]
fn test_extract_json_fenced() {
    let completion = "```json\n{\"a\": 1}\n```";
    assert_eq!(extract_json(completion), "{\"a\": 1}");
}

#[test]
fn test_extract_json_bare_fence() {
    let completion = "```\n[1, 2]\n```";
    assert_eq!(extract_json(completion), "[1, 2]");
}
