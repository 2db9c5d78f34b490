pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod mock;
pub mod openai;
pub mod router;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use adapter::{AdapterSettings, FallbackOutcome, ProviderAdapter};
pub use error::{CallError, InvalidProvider, ProviderError, ValidationError};
pub use mock::MockGenerator;
pub use router::{
    BackendFactory, ConnectionState, CredentialSource, EnvCredentials, Generation, HttpBackends,
    ProviderRouter, ProviderStatus, StaticCredentials, StatusSnapshot,
};

pub const SYSTEM_INSTRUCTION: &str = "You are an expert technical writer and product manager. \
    Generate well-structured, professional documentation.";

/// Placeholder in prompt templates that receives the caller's context.
pub const CONTEXT_PLACEHOLDER: &str = "{{context}}";

pub const MAX_CONTEXT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    OpenAI,
    Anthropic,
    Gemini,
}

impl ProviderName {
    pub const ALL: [ProviderName; 3] = [
        ProviderName::OpenAI,
        ProviderName::Anthropic,
        ProviderName::Gemini,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "openai",
            ProviderName::Anthropic => "anthropic",
            ProviderName::Gemini => "gemini",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "OpenAI",
            ProviderName::Anthropic => "Anthropic",
            ProviderName::Gemini => "Gemini",
        }
    }

    /// Candidate models in priority order, cheapest and fastest first.
    pub fn candidate_models(self) -> &'static [&'static str] {
        match self {
            ProviderName::OpenAI => &["gpt-4o-mini", "gpt-4o", "gpt-3.5-turbo"],
            ProviderName::Gemini => &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"],
            ProviderName::Anthropic => &["claude-3-sonnet-20240229"],
        }
    }

    /// Substring that marks this provider's chat models in a model listing.
    pub fn model_family(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "gpt",
            ProviderName::Anthropic => "claude",
            ProviderName::Gemini => "gemini",
        }
    }

    pub fn credential_var(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "OPENAI_API_KEY",
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn server_address(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "api.openai.com",
            ProviderName::Anthropic => "api.anthropic.com",
            ProviderName::Gemini => "generativelanguage.googleapis.com",
        }
    }

    pub fn usage_url(self) -> &'static str {
        match self {
            ProviderName::OpenAI => "https://platform.openai.com/usage",
            ProviderName::Anthropic => "https://console.anthropic.com/",
            ProviderName::Gemini => "https://makersuite.google.com/",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = InvalidProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderName::OpenAI),
            "anthropic" => Ok(ProviderName::Anthropic),
            "gemini" => Ok(ProviderName::Gemini),
            other => Err(InvalidProvider(other.to_string())),
        }
    }
}

/// A caller's request to generate one document.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt_template: String,
    pub context: String,
    /// Routes this single call to a provider other than the active one.
    pub provider_hint: Option<ProviderName>,
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt_template.trim().is_empty() {
            return Err(ValidationError::MissingField("prompt"));
        }
        if self.context.trim().is_empty() {
            return Err(ValidationError::MissingField("context"));
        }
        let len = self.context.chars().count();
        if len > MAX_CONTEXT_CHARS {
            return Err(ValidationError::ContextTooLong {
                len,
                max: MAX_CONTEXT_CHARS,
            });
        }
        Ok(())
    }
}

/// Substitutes `context` into the first placeholder occurrence of `template`.
pub fn fill_template(template: &str, context: &str) -> String {
    template.replacen(CONTEXT_PLACEHOLDER, context, 1)
}

/// One call to one model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub models: Vec<String>,
}

/// The narrow contract every external generation service is consumed through.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CallError>;

    /// Minimal connectivity check used by status reporting.
    async fn probe(&self) -> Result<ProbeReport, CallError>;
}
