use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use tokio::sync::Semaphore;

use super::anthropic::AnthropicBackend;
use super::openai::OpenAIBackend;
use super::{
    AdapterSettings, Backend, InvalidProvider, MockGenerator, ProviderAdapter, ProviderError,
    ProviderName, fill_template,
};
use crate::config::{Config, non_empty_var};
use crate::telemetry::metrics::MOCK_GENERATION_COUNT;

/// Model ids reported per provider in a status snapshot.
const LISTED_MODELS: usize = 5;

/// Where provider credentials come from.
pub trait CredentialSource: Send + Sync {
    fn credential(&self, provider: ProviderName) -> Option<String>;
}

/// Reads `*_API_KEY` from the process environment on every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credential(&self, provider: ProviderName) -> Option<String> {
        non_empty_var(provider.credential_var())
    }
}

/// In-memory credentials that can be changed after the router is built.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    keys: RwLock<HashMap<ProviderName, String>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, provider: ProviderName, key: &str) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(provider, key.to_string());
    }

    pub fn remove(&self, provider: ProviderName) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&provider);
    }
}

impl CredentialSource for StaticCredentials {
    fn credential(&self, provider: ProviderName) -> Option<String> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&provider)
            .filter(|k| !k.trim().is_empty())
            .cloned()
    }
}

/// Builds a credentialed backend for a provider.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, provider: ProviderName, credential: &str) -> Arc<dyn Backend>;
}

/// Real HTTP backends.
#[derive(Debug, Clone)]
pub struct HttpBackends {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub gemini_base_url: String,
}

impl HttpBackends {
    pub fn from_config(config: &Config) -> Self {
        Self {
            openai_base_url: config.openai_base_url.clone(),
            anthropic_base_url: config.anthropic_base_url.clone(),
            gemini_base_url: config.gemini_base_url.clone(),
        }
    }
}

impl BackendFactory for HttpBackends {
    fn connect(&self, provider: ProviderName, credential: &str) -> Arc<dyn Backend> {
        match provider {
            ProviderName::OpenAI => Arc::new(OpenAIBackend::new(credential, &self.openai_base_url)),
            ProviderName::Gemini => Arc::new(OpenAIBackend::new(credential, &self.gemini_base_url)),
            ProviderName::Anthropic => {
                Arc::new(AnthropicBackend::new(credential, &self.anthropic_base_url))
            }
        }
    }
}

/// Immutable routing table; replaced wholesale on every switch.
struct RoutingTable {
    active: ProviderName,
    adapters: HashMap<ProviderName, Arc<ProviderAdapter>>,
}

/// Text produced for one generation call.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub content: String,
    pub provider: ProviderName,
    /// Model that answered; `None` when the offline mock produced the text.
    pub model: Option<String>,
    pub mock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub key_present: bool,
    pub status: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderName,
    pub providers: HashMap<ProviderName, ProviderStatus>,
}

pub struct ProviderRouter {
    table: RwLock<Arc<RoutingTable>>,
    credentials: Arc<dyn CredentialSource>,
    backends: Arc<dyn BackendFactory>,
    settings: AdapterSettings,
    gates: HashMap<ProviderName, Arc<Semaphore>>,
    mock: MockGenerator,
}

impl ProviderRouter {
    pub fn new(
        active: ProviderName,
        credentials: Arc<dyn CredentialSource>,
        backends: Arc<dyn BackendFactory>,
        settings: AdapterSettings,
        max_concurrency: usize,
    ) -> Self {
        let gates = if max_concurrency > 0 {
            ProviderName::ALL
                .iter()
                .map(|p| (*p, Arc::new(Semaphore::new(max_concurrency))))
                .collect()
        } else {
            HashMap::new()
        };

        let mut router = Self {
            table: RwLock::new(Arc::new(RoutingTable {
                active,
                adapters: HashMap::new(),
            })),
            credentials,
            backends,
            settings,
            gates,
            mock: MockGenerator,
        };

        let adapters = ProviderName::ALL
            .iter()
            .filter_map(|p| router.build_adapter(*p).map(|a| (*p, Arc::new(a))))
            .collect();
        router.table = RwLock::new(Arc::new(RoutingTable { active, adapters }));

        tracing::info!(
            active = %active,
            configured = ?router.configured_providers(),
            "Provider router initialized"
        );

        router
    }

    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialSource>) -> Self {
        Self::new(
            config.llm_provider,
            credentials,
            Arc::new(HttpBackends::from_config(config)),
            AdapterSettings {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                call_timeout: config.call_timeout,
            },
            config.max_concurrency,
        )
    }

    fn build_adapter(&self, provider: ProviderName) -> Option<ProviderAdapter> {
        let credential = self.credentials.credential(provider)?;
        let backend = self.backends.connect(provider, &credential);
        let adapter = ProviderAdapter::new(provider, backend, self.settings.clone());
        Some(match self.gates.get(&provider) {
            Some(gate) => adapter.with_gate(gate.clone()),
            None => adapter,
        })
    }

    fn current(&self) -> Arc<RoutingTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn active_provider(&self) -> ProviderName {
        self.current().active
    }

    pub fn configured_providers(&self) -> Vec<ProviderName> {
        let table = self.current();
        ProviderName::ALL
            .into_iter()
            .filter(|p| table.adapters.contains_key(p))
            .collect()
    }

    /// Fills the template and generates with the active provider. Falls back to
    /// the offline mock when that provider has no credential.
    pub async fn generate(
        &self,
        prompt_template: &str,
        context: &str,
    ) -> Result<Generation, ProviderError> {
        self.generate_with(None, prompt_template, context).await
    }

    /// Like [`generate`](Self::generate) but lets one call target another provider
    /// without changing the active selection.
    #[tracing::instrument(
        name = "docgen generate",
        skip(self, prompt_template, context),
        fields(gen_ai.provider.name, docgen.mock, context.chars = context.chars().count())
    )]
    pub async fn generate_with(
        &self,
        provider_hint: Option<ProviderName>,
        prompt_template: &str,
        context: &str,
    ) -> Result<Generation, ProviderError> {
        let prompt = fill_template(prompt_template, context);

        // Captured once; a concurrent switch only affects calls that start later.
        let table = self.current();
        let provider = provider_hint.unwrap_or(table.active);
        let adapter = table.adapters.get(&provider).cloned();
        drop(table);

        let span = tracing::Span::current();
        span.record("gen_ai.provider.name", provider.as_str());
        span.record("docgen.mock", adapter.is_none());

        match adapter {
            Some(adapter) => {
                let completion = adapter.generate(&prompt).await?;
                Ok(Generation {
                    content: completion.content,
                    provider,
                    model: Some(completion.model),
                    mock: false,
                })
            }
            None => {
                tracing::info!(provider = %provider, "No credential configured, using mock generator");
                MOCK_GENERATION_COUNT.add(1, &[KeyValue::new("gen_ai.provider.name", provider.as_str())]);
                Ok(Generation {
                    content: self.mock.generate(&prompt, provider),
                    provider,
                    model: None,
                    mock: true,
                })
            }
        }
    }

    /// Makes `name` active and rebuilds its adapter from the current credentials.
    pub fn switch_provider(&self, name: &str) -> Result<ProviderName, InvalidProvider> {
        let provider: ProviderName = name.parse()?;
        let adapter = self.build_adapter(provider).map(Arc::new);

        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        let mut adapters = guard.adapters.clone();
        match adapter {
            Some(adapter) => adapters.insert(provider, adapter),
            None => adapters.remove(&provider),
        };
        *guard = Arc::new(RoutingTable {
            active: provider,
            adapters,
        });
        drop(guard);

        tracing::info!(provider = %provider, "Switched provider");
        Ok(provider)
    }

    /// Probes every credentialed provider. Nothing is cached.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let active = self.active_provider();

        let probes = ProviderName::ALL.into_iter().map(|provider| async move {
            let status = match self.build_adapter(provider) {
                None => ProviderStatus {
                    key_present: false,
                    status: ConnectionState::Unknown,
                    error: None,
                    available_models: Vec::new(),
                },
                Some(adapter) => match adapter.probe().await {
                    Ok(report) => ProviderStatus {
                        key_present: true,
                        status: ConnectionState::Connected,
                        error: None,
                        available_models: report
                            .models
                            .into_iter()
                            .filter(|id| id.contains(provider.model_family()))
                            .take(LISTED_MODELS)
                            .collect(),
                    },
                    Err(err) => {
                        tracing::warn!(provider = %provider, error = %err, "Provider probe failed");
                        ProviderStatus {
                            key_present: true,
                            status: ConnectionState::Error,
                            error: Some(err.to_string()),
                            available_models: Vec::new(),
                        }
                    }
                },
            };
            (provider, status)
        });

        StatusSnapshot {
            timestamp: Utc::now(),
            provider: active,
            providers: futures::future::join_all(probes).await.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::llm::adapter::tests::ScriptedBackend;
    use crate::llm::{CallError, Completion, CompletionRequest, ProbeReport};

    /// Hands out one shared scripted backend per provider and records connects.
    #[derive(Default)]
    struct FakeBackends {
        backends: HashMap<ProviderName, Arc<ScriptedBackend>>,
        connects: Mutex<Vec<(ProviderName, String)>>,
    }

    impl FakeBackends {
        fn with(mut self, provider: ProviderName, backend: ScriptedBackend) -> Self {
            self.backends.insert(provider, Arc::new(backend));
            self
        }

        fn backend(&self, provider: ProviderName) -> Arc<ScriptedBackend> {
            self.backends[&provider].clone()
        }
    }

    impl BackendFactory for FakeBackends {
        fn connect(&self, provider: ProviderName, credential: &str) -> Arc<dyn Backend> {
            self.connects
                .lock()
                .unwrap()
                .push((provider, credential.to_string()));
            self.backends
                .get(&provider)
                .cloned()
                .map(|b| b as Arc<dyn Backend>)
                .unwrap_or_else(|| Arc::new(ScriptedBackend::answering("default")))
        }
    }

    fn all_answering() -> FakeBackends {
        FakeBackends::default()
            .with(ProviderName::OpenAI, ScriptedBackend::answering("openai text"))
            .with(ProviderName::Anthropic, ScriptedBackend::answering("anthropic text"))
            .with(ProviderName::Gemini, ScriptedBackend::answering("gemini text"))
    }

    fn router(
        active: ProviderName,
        creds: Arc<StaticCredentials>,
        backends: Arc<FakeBackends>,
    ) -> ProviderRouter {
        ProviderRouter::new(active, creds, backends, AdapterSettings::default(), 0)
    }

    #[tokio::test]
    async fn test_switch_then_generate_uses_configured_adapter() {
        let creds = Arc::new(StaticCredentials::new());
        for provider in ProviderName::ALL {
            creds.set(provider, "key");
        }
        let backends = Arc::new(all_answering());
        let router = router(ProviderName::OpenAI, creds, backends.clone());

        for provider in ProviderName::ALL {
            router.switch_provider(provider.as_str()).unwrap();
            let generation = router.generate("Write: {{context}}", "ctx").await.unwrap();

            assert_eq!(generation.content, format!("{provider} text"));
            assert_eq!(generation.provider, provider);
            assert!(!generation.mock);
            assert_eq!(backends.backend(provider).called_models().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_switch_then_generate_without_credential_uses_mock() {
        let creds = Arc::new(StaticCredentials::new());
        let backends = Arc::new(all_answering());
        let router = router(ProviderName::OpenAI, creds, backends.clone());

        for provider in ProviderName::ALL {
            router.switch_provider(provider.as_str()).unwrap();
            let generation = router.generate("PRD for {{context}}", "ctx").await.unwrap();

            assert!(generation.mock);
            assert!(generation.model.is_none());
            assert!(generation.content.contains(provider.as_str()));
            assert!(generation.content.starts_with("# PRD - Sample Document"));
        }
        for provider in ProviderName::ALL {
            assert!(backends.backend(provider).called_models().is_empty());
        }
    }

    #[tokio::test]
    async fn test_prompt_receives_context() {
        struct Echo;

        #[async_trait::async_trait]
        impl Backend for Echo {
            async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CallError> {
                Ok(Completion {
                    content: req.prompt.clone(),
                    model: req.model.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }

            async fn probe(&self) -> Result<ProbeReport, CallError> {
                Ok(ProbeReport::default())
            }
        }

        struct EchoBackends;

        impl BackendFactory for EchoBackends {
            fn connect(&self, _: ProviderName, _: &str) -> Arc<dyn Backend> {
                Arc::new(Echo)
            }
        }

        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::Anthropic, "key");
        let router = ProviderRouter::new(
            ProviderName::Anthropic,
            creds,
            Arc::new(EchoBackends),
            AdapterSettings::default(),
            4,
        );

        let generation = router
            .generate("Context: {{context}} / {{context}}", "launch plan")
            .await
            .unwrap();
        assert_eq!(generation.content, "Context: launch plan / {{context}}");
        assert_eq!(generation.model.as_deref(), Some("claude-3-sonnet-20240229"));
    }

    #[tokio::test]
    async fn test_quota_error_propagates_without_provider_fallback() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::OpenAI, "key");
        creds.set(ProviderName::Gemini, "key");
        let backends = Arc::new(
            FakeBackends::default()
                .with(
                    ProviderName::OpenAI,
                    ScriptedBackend::default().script(
                        "gpt-4o-mini",
                        Err(CallError::Status {
                            status: 429,
                            message: "quota".to_string(),
                        }),
                    ),
                )
                .with(ProviderName::Gemini, ScriptedBackend::answering("gemini text")),
        );
        let router = router(ProviderName::OpenAI, creds, backends.clone());

        let err = router.generate("{{context}}", "ctx").await.unwrap_err();

        assert_eq!(err.kind(), "quota_exceeded");
        assert_eq!(err.provider(), ProviderName::OpenAI);
        assert!(backends.backend(ProviderName::Gemini).called_models().is_empty());
        assert_eq!(router.active_provider(), ProviderName::OpenAI);
    }

    #[tokio::test]
    async fn test_exhausted_error_is_surfaced() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::Gemini, "key");
        let backends = Arc::new(FakeBackends::default().with(
            ProviderName::Gemini,
            ScriptedBackend::default(),
        ));
        let router = router(ProviderName::Gemini, creds, backends.clone());

        let err = router.generate("{{context}}", "ctx").await.unwrap_err();

        assert_eq!(err.kind(), "exhausted_all_models");
        assert_eq!(
            backends.backend(ProviderName::Gemini).called_models(),
            vec!["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"]
        );
    }

    #[test]
    fn test_switch_rejects_unknown_provider() {
        let router = router(
            ProviderName::OpenAI,
            Arc::new(StaticCredentials::new()),
            Arc::new(all_answering()),
        );

        let err = router.switch_provider("ollama").unwrap_err();
        assert_eq!(err, InvalidProvider("ollama".to_string()));
        assert_eq!(router.active_provider(), ProviderName::OpenAI);
    }

    #[test]
    fn test_switch_is_idempotent() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::Gemini, "key");
        let router = router(ProviderName::Gemini, creds, Arc::new(all_answering()));

        assert_eq!(router.switch_provider("gemini").unwrap(), ProviderName::Gemini);
        assert_eq!(router.switch_provider("gemini").unwrap(), ProviderName::Gemini);
        assert_eq!(router.active_provider(), ProviderName::Gemini);
        assert_eq!(router.configured_providers(), vec![ProviderName::Gemini]);
    }

    #[tokio::test]
    async fn test_switch_picks_up_credential_added_after_start() {
        let creds = Arc::new(StaticCredentials::new());
        let backends = Arc::new(all_answering());
        let router = router(ProviderName::Anthropic, creds.clone(), backends.clone());

        assert!(router.generate("{{context}}", "ctx").await.unwrap().mock);

        creds.set(ProviderName::Anthropic, "late-key");
        // Not visible until an explicit switch.
        assert!(router.generate("{{context}}", "ctx").await.unwrap().mock);

        router.switch_provider("anthropic").unwrap();
        let generation = router.generate("{{context}}", "ctx").await.unwrap();
        assert_eq!(generation.content, "anthropic text");
        assert!(
            backends
                .connects
                .lock()
                .unwrap()
                .contains(&(ProviderName::Anthropic, "late-key".to_string()))
        );
    }

    #[tokio::test]
    async fn test_switch_drops_adapter_when_credential_removed() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::OpenAI, "key");
        let router = router(ProviderName::OpenAI, creds.clone(), Arc::new(all_answering()));

        creds.remove(ProviderName::OpenAI);
        router.switch_provider("openai").unwrap();

        assert!(router.generate("{{context}}", "ctx").await.unwrap().mock);
    }

    #[tokio::test]
    async fn test_in_flight_call_keeps_captured_adapter() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::OpenAI, "key");
        let backends = Arc::new(all_answering().with(
            ProviderName::OpenAI,
            ScriptedBackend::answering("openai text").with_delay(Duration::from_millis(100)),
        ));
        let router = Arc::new(router(ProviderName::OpenAI, creds, backends));

        let in_flight = {
            let router = router.clone();
            tokio::spawn(async move { router.generate("{{context}}", "ctx").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        router.switch_provider("gemini").unwrap();

        let first = in_flight.await.unwrap().unwrap();
        assert_eq!(first.provider, ProviderName::OpenAI);
        assert_eq!(first.content, "openai text");

        let second = router.generate("{{context}}", "ctx").await.unwrap();
        assert_eq!(second.provider, ProviderName::Gemini);
        assert!(second.mock);
    }

    #[tokio::test]
    async fn test_provider_hint_does_not_switch() {
        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::Anthropic, "key");
        let router = router(ProviderName::OpenAI, creds, Arc::new(all_answering()));

        let generation = router
            .generate_with(Some(ProviderName::Anthropic), "{{context}}", "ctx")
            .await
            .unwrap();
        assert_eq!(generation.content, "anthropic text");
        assert_eq!(router.active_provider(), ProviderName::OpenAI);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        struct FailingProbe;

        #[async_trait::async_trait]
        impl Backend for FailingProbe {
            async fn complete(&self, _: &CompletionRequest) -> Result<Completion, CallError> {
                Err(CallError::Api("unused".to_string()))
            }

            async fn probe(&self) -> Result<ProbeReport, CallError> {
                Err(CallError::Status {
                    status: 401,
                    message: "Incorrect API key provided".to_string(),
                })
            }
        }

        struct MixedBackends;

        impl BackendFactory for MixedBackends {
            fn connect(&self, provider: ProviderName, _: &str) -> Arc<dyn Backend> {
                match provider {
                    ProviderName::Gemini => Arc::new(FailingProbe),
                    _ => Arc::new(ScriptedBackend::answering("ok")),
                }
            }
        }

        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::OpenAI, "key");
        creds.set(ProviderName::Gemini, "key");
        let router = ProviderRouter::new(
            ProviderName::Gemini,
            creds,
            Arc::new(MixedBackends),
            AdapterSettings::default(),
            0,
        );

        let snapshot = router.status_snapshot().await;
        assert_eq!(snapshot.provider, ProviderName::Gemini);

        let openai = &snapshot.providers[&ProviderName::OpenAI];
        assert!(openai.key_present);
        assert_eq!(openai.status, ConnectionState::Connected);
        assert_eq!(openai.available_models, vec!["gpt-4o-mini"]);

        let gemini = &snapshot.providers[&ProviderName::Gemini];
        assert_eq!(gemini.status, ConnectionState::Error);
        assert_eq!(
            gemini.error.as_deref(),
            Some("HTTP 401: Incorrect API key provided")
        );

        let anthropic = &snapshot.providers[&ProviderName::Anthropic];
        assert!(!anthropic.key_present);
        assert_eq!(anthropic.status, ConnectionState::Unknown);
    }

    #[test]
    fn test_from_config_reads_credentials_from_injected_source() {
        let config = Config {
            port: 3001,
            environment: "test".to_string(),
            llm_provider: ProviderName::Anthropic,
            openai_base_url: "http://localhost/v1".to_string(),
            anthropic_base_url: "http://localhost".to_string(),
            gemini_base_url: "http://localhost/gemini".to_string(),
            max_tokens: 3000,
            temperature: 0.7,
            call_timeout: Duration::from_secs(30),
            max_concurrency: 2,
            otel_service_name: "test".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
        };

        let creds = Arc::new(StaticCredentials::new());
        creds.set(ProviderName::OpenAI, "sk-openai");
        creds.set(ProviderName::Gemini, "gm-key");

        let router = ProviderRouter::from_config(&config, creds.clone());
        assert_eq!(router.active_provider(), ProviderName::Anthropic);
        assert_eq!(
            router.configured_providers(),
            vec![ProviderName::OpenAI, ProviderName::Gemini]
        );

        creds.set(ProviderName::Anthropic, "sk-ant");
        router.switch_provider("anthropic").unwrap();
        assert!(router.configured_providers().contains(&ProviderName::Anthropic));
    }

    #[tokio::test]
    async fn test_status_lists_only_provider_family_models() {
        struct Listing;

        #[async_trait::async_trait]
        impl Backend for Listing {
            async fn complete(&self, _: &CompletionRequest) -> Result<Completion, CallError> {
                Err(CallError::Api("unused".to_string()))
            }

            async fn probe(&self) -> Result<ProbeReport, CallError> {
                let mut models: Vec<String> = ["whisper-1", "dall-e-3", "claude-3-haiku-20240307"]
                    .iter()
                    .map(|m| m.to_string())
                    .collect();
                models.extend((1..=7).map(|i| format!("gpt-test-{i}")));
                models.push("models/gemini-1.5-flash".to_string());
                Ok(ProbeReport { models })
            }
        }

        struct ListingBackends;

        impl BackendFactory for ListingBackends {
            fn connect(&self, _: ProviderName, _: &str) -> Arc<dyn Backend> {
                Arc::new(Listing)
            }
        }

        let creds = Arc::new(StaticCredentials::new());
        for provider in ProviderName::ALL {
            creds.set(provider, "key");
        }
        let router = ProviderRouter::new(
            ProviderName::OpenAI,
            creds,
            Arc::new(ListingBackends),
            AdapterSettings::default(),
            0,
        );

        let snapshot = router.status_snapshot().await;

        assert_eq!(
            snapshot.providers[&ProviderName::OpenAI].available_models,
            (1..=5).map(|i| format!("gpt-test-{i}")).collect::<Vec<_>>()
        );
        assert_eq!(
            snapshot.providers[&ProviderName::Anthropic].available_models,
            vec!["claude-3-haiku-20240307"]
        );
        assert_eq!(
            snapshot.providers[&ProviderName::Gemini].available_models,
            vec!["models/gemini-1.5-flash"]
        );
    }

    #[test]
    fn test_status_snapshot_serializes_provider_keys() {
        let snapshot = StatusSnapshot {
            timestamp: Utc::now(),
            provider: ProviderName::OpenAI,
            providers: HashMap::from([(
                ProviderName::OpenAI,
                ProviderStatus {
                    key_present: false,
                    status: ConnectionState::Unknown,
                    error: None,
                    available_models: Vec::new(),
                },
            )]),
        };
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["provider"], "openai");
        assert_eq!(json["providers"]["openai"]["status"], "unknown");
        assert_eq!(json["providers"]["openai"]["key_present"], false);
        assert!(json["providers"]["openai"].get("error").is_none());
    }
}
