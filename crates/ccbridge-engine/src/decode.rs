//! Decoding of engine stream-json lines into engine events.
//!
//! The engine emits one JSON object per line. Only a few shapes carry
//! meaning for the API surface; everything else is tool plumbing that passes
//! through as an opaque non-content signal or is skipped outright.

use ccbridge_core::{EngineEvent, EngineUsage, StopReason};
use serde_json::Value;
use tracing::{debug, warn};

/// Decode one stdout line into zero or more events.
///
/// A single assistant message may carry several content blocks, hence the
/// vector. Undecodable lines are logged and skipped — the stream contract is
/// enforced at the terminal event, not per line.
pub(crate) fn decode_line(line: &str) -> Vec<EngineEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping undecodable engine event line");
            return Vec::new();
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("system") => decode_system(&value),
        Some("assistant") => decode_assistant(&value),
        // Tool results are echoed back as user-typed messages; they are
        // engine-internal and never client-visible content.
        Some("user") => vec![EngineEvent::Tool { payload: value }],
        Some("result") => vec![decode_result(&value)],
        other => {
            debug!(event_type = ?other, "ignoring unrecognized engine event");
            Vec::new()
        }
    }
}

fn decode_system(value: &Value) -> Vec<EngineEvent> {
    if value.get("subtype").and_then(Value::as_str) == Some("init") {
        vec![EngineEvent::SystemInit {
            session_id: str_field(value, "session_id"),
            model: str_field(value, "model"),
        }]
    } else {
        debug!("ignoring non-init system event");
        Vec::new()
    }
}

fn decode_assistant(value: &Value) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    match value.pointer("/message/content") {
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str)
                            && !text.is_empty()
                        {
                            events.push(EngineEvent::AssistantDelta {
                                text: text.to_string(),
                            });
                        }
                    }
                    Some("tool_use") => events.push(EngineEvent::Tool {
                        payload: block.clone(),
                    }),
                    _ => {}
                }
            }
        }
        Some(Value::String(text)) if !text.is_empty() => {
            events.push(EngineEvent::AssistantDelta { text: text.clone() });
        }
        _ => {}
    }
    events
}

fn decode_result(value: &Value) -> EngineEvent {
    let subtype = value.get("subtype").and_then(Value::as_str).unwrap_or("");
    let is_error = value
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let stop_reason = if subtype == "error_max_turns" {
        StopReason::MaxTurns
    } else if subtype == "success" && !is_error {
        StopReason::EndTurn
    } else {
        let message = value
            .get("error_message")
            .or_else(|| value.get("result"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(subtype);
        StopReason::Error(message.to_string())
    };

    let usage = EngineUsage {
        input_tokens: value
            .pointer("/usage/input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output_tokens: value
            .pointer("/usage/output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        cost_usd: value
            .get("total_cost_usd")
            .or_else(|| value.get("cost_usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    };

    EngineEvent::Result {
        text: value
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        usage,
        stop_reason,
    }
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
