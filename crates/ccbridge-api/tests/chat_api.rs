//! End-to-end tests for /v1/chat/completions: streaming translation,
//! non-streaming collection, session continuity, and failure shaping.

mod common;

use axum::http::StatusCode;
use ccbridge_core::{EngineError, EngineEvent};
use common::{ScriptedEngine, happy_script, router, send_json, send_raw, sse_payloads, state_with};
use serde_json::{Value, json};
use std::time::Duration;

fn chat_body() -> Value {
    json!({
        "model": "claude-3-5-haiku-20241022",
        "messages": [{"role": "user", "content": "My color is blue"}]
    })
}

#[tokio::test]
async fn streaming_preserves_order_and_terminates_with_done() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["stream"] = json!(true);
    let (status, bytes) = send_raw(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let payloads = sse_payloads(&text);

    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    let chunks: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();

    // Exactly: preamble, two content deltas in engine order, terminal.
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "Hi");
    assert_eq!(chunks[2]["choices"][0]["delta"]["content"], " there");
    assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[3]["usage"]["prompt_tokens"], 12);
    assert_eq!(chunks[3]["usage"]["completion_tokens"], 34);

    let preambles = chunks
        .iter()
        .filter(|c| c["choices"][0]["delta"]["role"] == "assistant")
        .count();
    assert_eq!(preambles, 1);

    for chunk in &chunks {
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["id"], chunks[0]["id"]);
    }
}

#[tokio::test]
async fn non_streaming_returns_one_complete_response() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine, None);

    let (status, body) = send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(chat_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "Hi there");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 46);
    // Stateless request: no session id in the response.
    assert!(body.get("session_id").is_none());
}

#[tokio::test]
async fn session_mode_persists_the_turn_and_reports_the_id() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["session_id"] = json!("s1");
    let (status, response) = send_json(
        router(state.clone()),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["session_id"], "s1");

    let snapshot = state.sessions.get("s1").expect("session must exist");
    assert_eq!(snapshot.turn_count, 1);
    assert_eq!(snapshot.message_count, 2);

    let handle = state.sessions.acquire("s1").await;
    let messages = handle.messages();
    assert_eq!(messages[0].content, "My color is blue");
    assert_eq!(messages[1].content, "Hi there");
}

#[tokio::test]
async fn streaming_session_mode_persists_after_the_terminal_chunk() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["stream"] = json!(true);
    body["session_id"] = json!("s-stream");
    let (status, bytes) = send_raw(
        router(state.clone()),
        "POST",
        "/v1/chat/completions",
        Some(body),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("[DONE]"));

    let handle = state.sessions.acquire("s-stream").await;
    let messages = handle.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hi there");
}

#[tokio::test]
async fn second_request_sees_the_first_turn_in_its_context() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine.clone(), None);

    let mut first = chat_body();
    first["session_id"] = json!("s1");
    send_json(
        router(state.clone()),
        "POST",
        "/v1/chat/completions",
        Some(first),
    )
    .await;

    let second = json!({
        "model": "claude-3-5-haiku-20241022",
        "session_id": "s1",
        "messages": [{"role": "user", "content": "What is my color?"}]
    });
    send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(second),
    )
    .await;

    let requests = engine.requests();
    assert_eq!(requests.len(), 2);
    let prompt = &requests[1].prompt;
    assert!(prompt.contains("Human: My color is blue"));
    assert!(prompt.contains("Assistant: Hi there"));
    assert!(prompt.contains("Human: What is my color?"));
}

#[tokio::test]
async fn system_message_travels_as_system_prompt() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine.clone(), None);

    let body = json!({
        "model": "claude-3-5-haiku-20241022",
        "messages": [
            {"role": "system", "content": "Answer briefly."},
            {"role": "user", "content": "hi"}
        ]
    });
    send_json(router(state), "POST", "/v1/chat/completions", Some(body)).await;

    let requests = engine.requests();
    assert_eq!(requests[0].system_prompt.as_deref(), Some("Answer briefly."));
    assert!(!requests[0].prompt.contains("Answer briefly."));
}

#[tokio::test]
async fn empty_messages_are_rejected_before_the_engine_runs() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine.clone(), None);

    let body = json!({"model": "m", "messages": []});
    let (status, response) = send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["type"], "invalid_request_error");
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn more_than_one_choice_is_rejected() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine.clone(), None);

    let mut body = chat_body();
    body["n"] = json!(2);
    let (status, _) = send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn unknown_roles_are_rejected() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine, None);

    let body = json!({
        "model": "m",
        "messages": [{"role": "narrator", "content": "hi"}]
    });
    let (status, _) = send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn engine_unavailable_maps_to_a_single_error_response() {
    let engine = ScriptedEngine::failing(EngineError::Unavailable("no binary".into()));
    let state = state_with(engine, None);

    // Even when streaming was requested: nothing was sent yet, so the
    // client gets one structured error, not a degraded stream.
    let mut body = chat_body();
    body["stream"] = json!(true);
    let (status, response) = send_json(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response["error"]["code"], "engine_unavailable");
}

#[tokio::test]
async fn timeout_surfaces_as_gateway_timeout_and_stores_nothing() {
    let engine = ScriptedEngine::replaying(vec![Err(EngineError::Timeout(
        Duration::from_millis(100),
    ))]);
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["session_id"] = json!("timeout-session");
    let (status, response) = send_json(
        router(state.clone()),
        "POST",
        "/v1/chat/completions",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response["error"]["code"], "engine_timeout");
    assert_eq!(state.sessions.stats().total_messages_stored, 0);
}

#[tokio::test]
async fn mid_stream_failure_still_sends_terminal_chunk_and_done() {
    let engine = ScriptedEngine::replaying(vec![
        Ok(EngineEvent::AssistantDelta {
            text: "partial".into(),
        }),
        Err(EngineError::Timeout(Duration::from_millis(100))),
    ]);
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["stream"] = json!(true);
    body["session_id"] = json!("broken");
    let (status, bytes) = send_raw(
        router(state.clone()),
        "POST",
        "/v1/chat/completions",
        Some(body),
        None,
    )
    .await;

    // Streaming already began: the failure arrives in-band.
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let payloads = sse_payloads(&text);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let chunks: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "partial");
    assert_eq!(
        chunks.last().unwrap()["choices"][0]["finish_reason"],
        "error"
    );

    // The incomplete turn is never persisted.
    assert_eq!(state.sessions.stats().total_messages_stored, 0);
}

#[tokio::test]
async fn stream_ending_without_result_is_shaped_as_an_error() {
    let engine = ScriptedEngine::replaying(vec![Ok(EngineEvent::AssistantDelta {
        text: "x".into(),
    })]);
    let state = state_with(engine, None);

    let mut body = chat_body();
    body["stream"] = json!(true);
    let (status, bytes) = send_raw(
        router(state),
        "POST",
        "/v1/chat/completions",
        Some(body),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let payloads = sse_payloads(&text);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    let terminal: Value =
        serde_json::from_str(&payloads[payloads.len() - 2]).unwrap();
    assert_eq!(terminal["choices"][0]["finish_reason"], "error");
}

#[tokio::test]
async fn multipart_content_is_flattened_with_a_placeholder() {
    let engine = ScriptedEngine::replaying(happy_script());
    let state = state_with(engine.clone(), None);

    let body = json!({
        "model": "m",
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "describe this"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,xxxx"}}
            ]
        }]
    });
    send_json(router(state), "POST", "/v1/chat/completions", Some(body)).await;

    let prompt = engine.requests()[0].prompt.clone();
    assert!(prompt.contains("describe this"));
    assert!(prompt.contains("[Image content not supported]"));
}
