//! OpenAI parameter compatibility.
//!
//! The engine exposes none of OpenAI's sampling knobs. Harmless parameters
//! are accepted, reported as warnings, and ignored; parameters that would
//! change the response contract (more than one choice) are rejected before
//! the engine is ever invoked.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ApiError;
use crate::models::ChatCompletionRequest;

/// Static verdict for one request parameter.
struct ParamRule {
    name: &'static str,
    supported: bool,
    reason: &'static str,
}

const RULES: &[ParamRule] = &[
    ParamRule {
        name: "model",
        supported: true,
        reason: "forwarded to the engine",
    },
    ParamRule {
        name: "messages",
        supported: true,
        reason: "rendered into the engine prompt",
    },
    ParamRule {
        name: "stream",
        supported: true,
        reason: "selects SSE streaming",
    },
    ParamRule {
        name: "session_id",
        supported: true,
        reason: "enables server-side conversation continuity",
    },
    ParamRule {
        name: "temperature",
        supported: false,
        reason: "the engine does not expose sampling temperature",
    },
    ParamRule {
        name: "top_p",
        supported: false,
        reason: "the engine does not expose nucleus sampling",
    },
    ParamRule {
        name: "n",
        supported: false,
        reason: "only a single choice can be produced",
    },
    ParamRule {
        name: "max_tokens",
        supported: false,
        reason: "output length is governed by the engine",
    },
    ParamRule {
        name: "stop",
        supported: false,
        reason: "stop sequences are not configurable",
    },
    ParamRule {
        name: "presence_penalty",
        supported: false,
        reason: "repetition penalties are not configurable",
    },
    ParamRule {
        name: "frequency_penalty",
        supported: false,
        reason: "repetition penalties are not configurable",
    },
    ParamRule {
        name: "logit_bias",
        supported: false,
        reason: "token biasing is not configurable",
    },
    ParamRule {
        name: "user",
        supported: false,
        reason: "not forwarded to the engine",
    },
];

/// Verdict for one supplied parameter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamVerdict {
    pub supported: bool,
    pub reason: &'static str,
}

/// Compatibility report for a concrete request.
#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityReport {
    /// Verdict per parameter actually supplied in the request.
    pub parameters: BTreeMap<&'static str, ParamVerdict>,
    /// Human-readable warnings for ignored parameters.
    pub warnings: Vec<String>,
}

fn supplied(request: &ChatCompletionRequest) -> Vec<&'static str> {
    let mut names = vec!["model", "messages"];
    if request.stream {
        names.push("stream");
    }
    if request.session_id.is_some() {
        names.push("session_id");
    }
    if request.temperature.is_some() {
        names.push("temperature");
    }
    if request.top_p.is_some() {
        names.push("top_p");
    }
    if request.n.is_some() {
        names.push("n");
    }
    if request.max_tokens.is_some() {
        names.push("max_tokens");
    }
    if request.stop.is_some() {
        names.push("stop");
    }
    if request.presence_penalty.is_some() {
        names.push("presence_penalty");
    }
    if request.frequency_penalty.is_some() {
        names.push("frequency_penalty");
    }
    if request.logit_bias.is_some() {
        names.push("logit_bias");
    }
    if request.user.is_some() {
        names.push("user");
    }
    names
}

fn rule(name: &str) -> Option<&'static ParamRule> {
    RULES.iter().find(|r| r.name == name)
}

/// Build the compatibility report for a request without invoking the engine.
#[must_use]
pub fn report(request: &ChatCompletionRequest) -> CompatibilityReport {
    let mut parameters = BTreeMap::new();
    let mut warnings = Vec::new();
    for name in supplied(request) {
        if let Some(rule) = rule(name) {
            parameters.insert(
                rule.name,
                ParamVerdict {
                    supported: rule.supported,
                    reason: rule.reason,
                },
            );
            if !rule.supported {
                warnings.push(ignore_warning(rule));
            }
        }
    }
    CompatibilityReport {
        parameters,
        warnings,
    }
}

/// Validate a request, returning warnings for ignored parameters.
///
/// # Errors
///
/// `ApiError::InvalidRequest` for parameters that cannot be ignored:
/// requesting more than one choice conflicts with the response contract.
pub fn validate(request: &ChatCompletionRequest) -> Result<Vec<String>, ApiError> {
    if let Some(n) = request.n
        && n != 1
    {
        return Err(ApiError::InvalidRequest(
            "n must be 1: only a single choice can be produced".to_string(),
        ));
    }

    let warnings = supplied(request)
        .into_iter()
        .filter_map(rule)
        .filter(|rule| !rule.supported)
        .map(ignore_warning)
        .collect();
    Ok(warnings)
}

fn ignore_warning(rule: &ParamRule) -> String {
    format!(
        "parameter `{}` is not supported and will be ignored ({})",
        rule.name, rule.reason
    )
}
