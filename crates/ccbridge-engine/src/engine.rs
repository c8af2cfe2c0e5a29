//! Engine process lifecycle: spawn, stream, teardown.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ccbridge_core::{EngineError, EngineEvent, EnginePort, EngineRequest, EngineStream};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::auth::AuthEnv;
use crate::binary::{probe, resolve_binary};
use crate::decode::decode_line;

/// Configuration for the engine adapter.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine binary; `None` resolves via env override and `PATH`.
    pub binary: Option<PathBuf>,
    /// Working directory for engine invocations.
    pub cwd: Option<PathBuf>,
    /// Deadline applied when a request does not carry its own.
    pub default_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            cwd: None,
            default_timeout: Duration::from_secs(600),
        }
    }
}

/// The engine adapter: one instance serves the whole process, one child
/// process per invocation.
pub struct ClaudeEngine {
    binary: PathBuf,
    cwd: Option<PathBuf>,
    default_timeout: Duration,
    auth: AuthEnv,
}

impl ClaudeEngine {
    /// Build the adapter, resolving the binary and classifying the
    /// authentication environment once.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            binary: resolve_binary(config.binary),
            cwd: config.cwd,
            default_timeout: config.default_timeout,
            auth: AuthEnv::resolve_from_env(),
        }
    }

    /// The resolved authentication environment.
    #[must_use]
    pub const fn auth(&self) -> &AuthEnv {
        &self.auth
    }

    /// Verify the binary runs, returning its version string.
    ///
    /// # Errors
    ///
    /// See [`probe`].
    pub async fn verify(&self) -> Result<String, EngineError> {
        probe(&self.binary).await
    }

    fn build_command(&self, request: &EngineRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg(&request.prompt)
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");

        if let Some(system_prompt) = &request.system_prompt {
            cmd.arg("--system-prompt").arg(system_prompt);
        }
        if let Some(model) = &request.model {
            cmd.arg("--model").arg(model);
        }

        let options = &request.options;
        if let Some(max_turns) = options.max_turns {
            cmd.arg("--max-turns").arg(max_turns.to_string());
        }
        if let Some(tools) = &options.allowed_tools {
            cmd.arg("--allowedTools").arg(tools.join(","));
        }
        if let Some(tools) = &options.disallowed_tools {
            cmd.arg("--disallowedTools").arg(tools.join(","));
        }
        if let Some(mode) = &options.permission_mode {
            cmd.arg("--permission-mode").arg(mode);
        }
        if let Some(budget) = options.max_thinking_tokens {
            cmd.arg("--max-thinking-tokens").arg(budget.to_string());
        }

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in self.auth.child_env() {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl EnginePort for ClaudeEngine {
    async fn invoke(&self, request: EngineRequest) -> Result<EngineStream, EngineError> {
        let timeout = request.options.timeout.unwrap_or(self.default_timeout);
        let mut cmd = self.build_command(&request);

        let mut child = cmd.spawn().map_err(|e| {
            EngineError::Unavailable(format!(
                "failed to start engine process `{}`: {e}. Install it with `npm install -g @anthropic-ai/claude-code`",
                self.binary.display()
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine stdout was not captured".into()))?;
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_drain(stderr);
        }

        debug!(binary = %self.binary.display(), ?timeout, "engine process started");

        let state = StreamState {
            // Held for its lifetime only: dropping the stream kills the child.
            _child: child,
            lines: BufReader::new(stdout).lines(),
            deadline: Instant::now() + timeout,
            timeout,
            queued: VecDeque::new(),
            saw_result: false,
            finished: false,
        };

        Ok(stream::unfold(state, next_event).boxed())
    }
}

/// State threaded through the event stream.
struct StreamState {
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    deadline: Instant,
    timeout: Duration,
    queued: VecDeque<EngineEvent>,
    saw_result: bool,
    finished: bool,
}

async fn next_event(
    mut st: StreamState,
) -> Option<(Result<EngineEvent, EngineError>, StreamState)> {
    loop {
        if let Some(event) = st.queued.pop_front() {
            if matches!(event, EngineEvent::Result { .. }) {
                // Exactly one result, always last: stop reading afterwards.
                st.saw_result = true;
                st.finished = true;
                st.queued.clear();
            }
            return Some((Ok(event), st));
        }
        if st.finished {
            return None;
        }

        match tokio::time::timeout_at(st.deadline, st.lines.next_line()).await {
            Err(_) => {
                warn!(timeout = ?st.timeout, "engine invocation exceeded its deadline");
                st.finished = true;
                return Some((Err(EngineError::Timeout(st.timeout)), st));
            }
            Ok(Ok(Some(line))) => {
                st.queued.extend(decode_line(&line));
            }
            Ok(Ok(None)) => {
                st.finished = true;
                if st.saw_result {
                    return None;
                }
                warn!("engine stream ended without a result event");
                return Some((Err(EngineError::Incomplete), st));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "engine stream read failed");
                st.finished = true;
                return Some((Err(EngineError::Incomplete), st));
            }
        }
    }
}

/// Drain engine stderr into the trace log.
///
/// Byte-based line reading with lossy decoding: a reader built on
/// `lines()` would die on the first invalid UTF-8 sequence.
fn spawn_stderr_drain(stream: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf);
                    if !line.trim().is_empty() {
                        debug!(stream = "stderr", "engine: {line}");
                    }
                }
                Err(e) => {
                    debug!(error = %e, "engine stderr reader exiting");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccbridge_core::EngineOptions;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn command_carries_prompt_and_stream_format() {
        let engine = ClaudeEngine::new(EngineConfig::default());
        let request = EngineRequest::new("Human: hi");
        let cmd = engine.build_command(&request);
        let args = args_of(&cmd);
        assert_eq!(args[0], "-p");
        assert_eq!(args[1], "Human: hi");
        assert!(args.contains(&"stream-json".to_string()));
        assert!(args.contains(&"--verbose".to_string()));
        assert!(!args.contains(&"--system-prompt".to_string()));
    }

    #[test]
    fn command_maps_every_option() {
        let engine = ClaudeEngine::new(EngineConfig::default());
        let request = EngineRequest::new("p")
            .with_system_prompt(Some("be brief".into()))
            .with_model(Some("claude-sonnet-4-20250514".into()))
            .with_options(EngineOptions {
                max_turns: Some(5),
                allowed_tools: Some(vec!["Read".into(), "Bash".into()]),
                disallowed_tools: Some(vec!["WebSearch".into()]),
                permission_mode: Some("acceptEdits".into()),
                max_thinking_tokens: Some(1024),
                timeout: None,
            });
        let args = args_of(&engine.build_command(&request));

        for expected in [
            "--system-prompt",
            "be brief",
            "--model",
            "claude-sonnet-4-20250514",
            "--max-turns",
            "5",
            "--allowedTools",
            "Read,Bash",
            "--disallowedTools",
            "WebSearch",
            "--permission-mode",
            "acceptEdits",
            "--max-thinking-tokens",
            "1024",
        ] {
            assert!(args.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn invoking_a_missing_binary_fails_before_any_event() {
        let engine = ClaudeEngine::new(EngineConfig {
            binary: Some(PathBuf::from("/nonexistent/claude-binary")),
            ..EngineConfig::default()
        });
        let err = engine
            .invoke(EngineRequest::new("hi"))
            .await
            .err()
            .expect("spawn must fail");
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
