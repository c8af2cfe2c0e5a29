//! Shared test harness: a scripted engine and router construction.
#![allow(dead_code)] // not every test binary uses every helper

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use ccbridge_api::{ApiConfig, ApiContext, AppState, CorsConfig, create_router};
use ccbridge_core::{
    EngineError, EngineEvent, EnginePort, EngineRequest, EngineStream, EngineUsage, SessionConfig,
    SessionStore, StopReason,
};
use ccbridge_engine::{AuthMethod, AuthStatus};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Engine double that replays a fixed event script per invocation and
/// records every request it sees.
pub struct ScriptedEngine {
    script: Vec<Result<EngineEvent, EngineError>>,
    fail_invoke: Option<EngineError>,
    pub seen: Mutex<Vec<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn replaying(script: Vec<Result<EngineEvent, EngineError>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_invoke: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: EngineError) -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            fail_invoke: Some(err),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnginePort for ScriptedEngine {
    async fn invoke(&self, request: EngineRequest) -> Result<EngineStream, EngineError> {
        self.seen.lock().unwrap().push(request);
        if let Some(err) = &self.fail_invoke {
            return Err(err.clone());
        }
        Ok(futures_util::stream::iter(self.script.clone()).boxed())
    }
}

/// The canonical happy-path script: init, two fragments, terminal result.
pub fn happy_script() -> Vec<Result<EngineEvent, EngineError>> {
    vec![
        Ok(EngineEvent::SystemInit {
            session_id: "upstream-1".into(),
            model: "claude-3-5-haiku-20241022".into(),
        }),
        Ok(EngineEvent::AssistantDelta { text: "Hi".into() }),
        Ok(EngineEvent::AssistantDelta {
            text: " there".into(),
        }),
        Ok(EngineEvent::Result {
            text: "Hi there".into(),
            usage: EngineUsage {
                input_tokens: 12,
                output_tokens: 34,
                cost_usd: 0.001,
            },
            stop_reason: StopReason::EndTurn,
        }),
    ]
}

pub fn state_with(engine: Arc<ScriptedEngine>, api_key: Option<String>) -> AppState {
    Arc::new(ApiContext {
        engine,
        sessions: Arc::new(SessionStore::new(SessionConfig::default())),
        auth: AuthStatus {
            method: AuthMethod::CliSession,
            ready: true,
            warnings: Vec::new(),
        },
        config: ApiConfig {
            api_key,
            request_timeout: Duration::from_secs(5),
        },
    })
}

pub fn router(state: AppState) -> Router {
    create_router(state, &CorsConfig::AllowAll)
}

pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send_raw(app, method, uri, body, None).await;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body must be JSON")
    };
    (status, json)
}

pub async fn send_raw(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    bearer: Option<&str>,
) -> (StatusCode, bytes::Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(key) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

/// Split an SSE body into its `data:` payloads, preserving order.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("frame without data prefix: {frame:?}"))
                .to_string()
        })
        .collect()
}
