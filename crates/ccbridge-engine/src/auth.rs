//! Environment-based engine authentication selection.
//!
//! The engine binary supports several credential sources; which one applies
//! is decided by environment variables, mirroring how the binary itself
//! resolves them. This module classifies the environment once at startup and
//! assembles the variables explicitly forwarded to the child process.
//!
//! Secret values are never logged or serialized — only which method is in
//! effect and what is missing.

use serde::Serialize;

/// Credential source the engine will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Direct API key via `ANTHROPIC_API_KEY`.
    Anthropic,
    /// AWS Bedrock, selected by `CLAUDE_CODE_USE_BEDROCK`.
    Bedrock,
    /// Google Vertex, selected by `CLAUDE_CODE_USE_VERTEX`.
    Vertex,
    /// Fall back to the engine's own stored login session.
    CliSession,
}

impl AuthMethod {
    /// Stable string form used in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Vertex => "vertex",
            Self::CliSession => "claude-cli",
        }
    }
}

/// Diagnostic view of the resolved authentication, safe to expose over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub method: AuthMethod,
    /// True when no configuration gaps were detected. The engine itself has
    /// the final word; this is a preflight hint, not a guarantee.
    pub ready: bool,
    pub warnings: Vec<String>,
}

/// Resolved authentication environment for engine invocations.
#[derive(Debug, Clone)]
pub struct AuthEnv {
    method: AuthMethod,
    /// Variables explicitly forwarded to the child process.
    vars: Vec<(String, String)>,
    warnings: Vec<String>,
}

fn flag_set(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}

fn var_present(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.trim().is_empty())
}

impl AuthEnv {
    /// Classify the current process environment.
    #[must_use]
    pub fn resolve_from_env() -> Self {
        let mut vars = Vec::new();
        let mut warnings = Vec::new();

        let method = if flag_set("CLAUDE_CODE_USE_BEDROCK") {
            vars.push(("CLAUDE_CODE_USE_BEDROCK".to_string(), "1".to_string()));
            if !var_present("AWS_PROFILE")
                && !(var_present("AWS_ACCESS_KEY_ID") && var_present("AWS_SECRET_ACCESS_KEY"))
            {
                warnings.push(
                    "Bedrock selected but neither AWS_PROFILE nor AWS access keys are set"
                        .to_string(),
                );
            }
            if !var_present("AWS_REGION") {
                warnings.push("Bedrock selected but AWS_REGION is not set".to_string());
            }
            AuthMethod::Bedrock
        } else if flag_set("CLAUDE_CODE_USE_VERTEX") {
            vars.push(("CLAUDE_CODE_USE_VERTEX".to_string(), "1".to_string()));
            if !var_present("ANTHROPIC_VERTEX_PROJECT_ID") {
                warnings
                    .push("Vertex selected but ANTHROPIC_VERTEX_PROJECT_ID is not set".to_string());
            }
            if !var_present("CLOUD_ML_REGION") {
                warnings.push("Vertex selected but CLOUD_ML_REGION is not set".to_string());
            }
            AuthMethod::Vertex
        } else if var_present("ANTHROPIC_API_KEY") {
            // The child inherits the key from the parent environment; nothing
            // to forward explicitly, and nothing secret to record here.
            AuthMethod::Anthropic
        } else {
            AuthMethod::CliSession
        };

        Self {
            method,
            vars,
            warnings,
        }
    }

    /// Which credential source is in effect.
    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        self.method
    }

    /// Variables to set explicitly on the child process.
    #[must_use]
    pub fn child_env(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Diagnostic status for the auth endpoint.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            method: self.method,
            ready: self.warnings.is_empty(),
            warnings: self.warnings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_strings_are_stable() {
        assert_eq!(AuthMethod::Anthropic.as_str(), "anthropic");
        assert_eq!(AuthMethod::CliSession.as_str(), "claude-cli");
    }

    #[test]
    fn status_never_carries_secret_values() {
        let auth = AuthEnv {
            method: AuthMethod::Anthropic,
            vars: Vec::new(),
            warnings: Vec::new(),
        };
        let json = serde_json::to_string(&auth.status()).unwrap();
        assert!(json.contains("anthropic"));
        assert!(!json.contains("ANTHROPIC_API_KEY"));
    }
}
