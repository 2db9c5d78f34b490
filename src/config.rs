use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::llm::ProviderName;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub llm_provider: ProviderName,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub gemini_base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub call_timeout: Duration,
    pub max_concurrency: usize,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: parse_var("APP_PORT", "3001")?,
            environment: env::var("APP_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            llm_provider: env::var("LLM_PROVIDER")
                .unwrap_or_else(|_| "openai".to_string())
                .parse()
                .context("LLM_PROVIDER must be one of openai, anthropic, gemini")?,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
            }),
            max_tokens: parse_var("LLM_MAX_TOKENS", "3000")?,
            temperature: parse_var("LLM_TEMPERATURE", "0.7")?,
            call_timeout: Duration::from_secs(parse_var("LLM_CALL_TIMEOUT_SECS", "30")?),
            max_concurrency: parse_var("LLM_MAX_CONCURRENCY", "8")?,
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "ai-doc-generator".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Reads an environment variable, treating an empty value as unset.
pub fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{key} must be a number"))
}
