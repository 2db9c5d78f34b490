use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::ProviderName;

/// Failure of a single call to a single model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Api(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CallError {
    /// Account-wide quota or rate-limit exhaustion. Other models of the same
    /// provider will fail the same way, so the fallback loop stops here.
    pub fn is_quota(&self) -> bool {
        match self {
            CallError::Status { status: 429, .. } => true,
            CallError::Timeout(_) => false,
            other => {
                let msg = other.to_string().to_lowercase();
                msg.contains("quota")
                    || msg.contains("rate limit")
                    || msg.contains("rate_limit")
                    || msg.contains("429")
            }
        }
    }

    /// Coarse category recorded as `error.type` on the call span.
    pub fn category(&self) -> &'static str {
        if self.is_quota() {
            return "rate_limit";
        }
        match self {
            CallError::Timeout(_) => return "timeout",
            CallError::Status { status: 401 | 403, .. } => return "auth_error",
            CallError::Status { status: 400 | 404 | 422, .. } => return "invalid_request",
            CallError::Status { status: 500..=599, .. } => return "server_error",
            _ => {}
        }

        let msg = self.to_string().to_lowercase();
        if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
            "timeout"
        } else if msg.contains("401")
            || msg.contains("403")
            || msg.contains("auth")
            || msg.contains("api key")
        {
            "auth_error"
        } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
            "invalid_request"
        } else if msg.contains("500")
            || msg.contains("502")
            || msg.contains("503")
            || msg.contains("server")
        {
            "server_error"
        } else if msg.contains("connect")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("reset")
        {
            "network_error"
        } else {
            "unknown_error"
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// OpenAI and Anthropic send one envelope; Gemini's compatibility layer may
/// wrap it in an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    One(ErrorEnvelope),
    Many(Vec<ErrorEnvelope>),
}

fn error_message(body: &str) -> Option<String> {
    let envelope = match serde_json::from_str::<ErrorBody>(body).ok()? {
        ErrorBody::One(envelope) => envelope,
        ErrorBody::Many(envelopes) => envelopes.into_iter().next()?,
    };
    Some(envelope.error.message)
}

/// Turns a non-2xx provider response into `CallError::Status`. The status is
/// kept even when the body is not a recognizable error envelope.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CallError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or(body),
    })
}

pub(crate) fn transport(err: reqwest::Error) -> CallError {
    CallError::Transport(err.to_string())
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error(
        "{} quota exceeded. Please check your billing or try again later. ({cause})",
        .provider.display_name()
    )]
    QuotaExceeded {
        provider: ProviderName,
        cause: CallError,
    },

    #[error("all {} models failed; last error: {last_error}", .provider.display_name())]
    ExhaustedAllModels {
        provider: ProviderName,
        last_error: CallError,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderName {
        match self {
            ProviderError::QuotaExceeded { provider, .. }
            | ProviderError::ExhaustedAllModels { provider, .. } => *provider,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::QuotaExceeded { .. } => "quota_exceeded",
            ProviderError::ExhaustedAllModels { .. } => "exhausted_all_models",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid provider '{0}'. Must be: openai, anthropic, or gemini")]
pub struct InvalidProvider(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Context is too long ({len} characters). Please limit to {max} characters.")]
    ContextTooLong { len: usize, max: usize },
}
