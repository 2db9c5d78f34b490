use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::Semaphore;
use tracing::Instrument;

use super::{
    Backend, CallError, Completion, CompletionRequest, ProbeReport, ProviderError, ProviderName,
    SYSTEM_INSTRUCTION,
};
use crate::telemetry::metrics::{
    GEN_AI_ERROR_COUNT, GEN_AI_MODEL_FALLBACK_COUNT, GEN_AI_OPERATION_DURATION,
    GEN_AI_QUOTA_EXCEEDED_COUNT, GEN_AI_TOKEN_USAGE,
};

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub call_timeout: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            temperature: 0.7,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of walking the candidate model list.
#[derive(Debug)]
pub enum FallbackOutcome {
    Success(Completion),
    QuotaExceeded(CallError),
    ExhaustedAllModels(CallError),
}

/// One configured provider: a credentialed backend plus its ordered candidate models.
pub struct ProviderAdapter {
    provider: ProviderName,
    models: Vec<String>,
    backend: Arc<dyn Backend>,
    settings: AdapterSettings,
    gate: Option<Arc<Semaphore>>,
}

impl ProviderAdapter {
    pub fn new(provider: ProviderName, backend: Arc<dyn Backend>, settings: AdapterSettings) -> Self {
        Self {
            provider,
            models: provider
                .candidate_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
            backend,
            settings,
            gate: None,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Bounds the number of in-flight calls to this provider.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn provider(&self) -> ProviderName {
        self.provider
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError> {
        match self.run(prompt).await {
            FallbackOutcome::Success(completion) => Ok(completion),
            FallbackOutcome::QuotaExceeded(cause) => Err(ProviderError::QuotaExceeded {
                provider: self.provider,
                cause,
            }),
            FallbackOutcome::ExhaustedAllModels(last_error) => {
                Err(ProviderError::ExhaustedAllModels {
                    provider: self.provider,
                    last_error,
                })
            }
        }
    }

    /// Tries candidates in order. Later candidates are only called after every
    /// earlier one failed for a non-quota reason.
    pub async fn run(&self, prompt: &str) -> FallbackOutcome {
        let mut last_error = None;

        for (idx, model) in self.models.iter().enumerate() {
            match self.call_model(model, prompt).await {
                Ok(completion) => {
                    tracing::info!(
                        provider = %self.provider,
                        model = %model,
                        attempt = idx + 1,
                        "Generation succeeded"
                    );
                    return FallbackOutcome::Success(completion);
                }
                Err(err) if err.is_quota() => {
                    tracing::warn!(
                        provider = %self.provider,
                        model = %model,
                        error = %err,
                        "Quota exceeded, skipping remaining models"
                    );
                    GEN_AI_QUOTA_EXCEEDED_COUNT.add(
                        1,
                        &[KeyValue::new("gen_ai.provider.name", self.provider.as_str())],
                    );
                    return FallbackOutcome::QuotaExceeded(err);
                }
                Err(err) => {
                    let has_next = idx + 1 < self.models.len();
                    tracing::warn!(
                        provider = %self.provider,
                        model = %model,
                        error = %err,
                        has_next,
                        "Model failed"
                    );
                    if has_next {
                        GEN_AI_MODEL_FALLBACK_COUNT.add(
                            1,
                            &[
                                KeyValue::new("gen_ai.provider.name", self.provider.as_str()),
                                KeyValue::new("gen_ai.request.model", model.clone()),
                            ],
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        FallbackOutcome::ExhaustedAllModels(last_error.unwrap_or_else(|| {
            CallError::Malformed("no candidate models configured".to_string())
        }))
    }

    pub async fn probe(&self) -> Result<ProbeReport, CallError> {
        tokio::time::timeout(self.settings.call_timeout, self.backend.probe())
            .await
            .map_err(|_| CallError::Timeout(self.settings.call_timeout))?
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<Completion, CallError> {
        let req = CompletionRequest {
            model: model.to_string(),
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: prompt.to_string(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %format!("gen_ai.chat {model}"),
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %self.provider,
            gen_ai.request.model = %model,
            server.address = %self.provider.server_address(),
            gen_ai.request.temperature = req.temperature,
            gen_ai.request.max_tokens = req.max_tokens as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        // Waiting for a gate permit counts against the call timeout.
        let call = async {
            let _permit = match &self.gate {
                Some(gate) => Some(
                    gate.acquire()
                        .await
                        .map_err(|_| CallError::Transport("concurrency gate closed".to_string()))?,
                ),
                None => None,
            };
            self.backend.complete(&req).await
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.settings.call_timeout, call)
            .instrument(span.clone())
            .await
            .unwrap_or(Err(CallError::Timeout(self.settings.call_timeout)));
        let duration = start.elapsed().as_secs_f64();

        let provider_kv = KeyValue::new("gen_ai.provider.name", self.provider.as_str());
        let model_kv = KeyValue::new("gen_ai.request.model", model.to_string());

        match &result {
            Ok(completion) => {
                span.record("gen_ai.response.model", completion.model.as_str());
                span.record("gen_ai.usage.input_tokens", completion.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", completion.output_tokens as i64);

                for (kind, tokens) in [
                    ("input", completion.input_tokens),
                    ("output", completion.output_tokens),
                ] {
                    GEN_AI_TOKEN_USAGE.record(
                        f64::from(tokens),
                        &[
                            KeyValue::new("gen_ai.token.type", kind),
                            provider_kv.clone(),
                            model_kv.clone(),
                        ],
                    );
                }
                GEN_AI_OPERATION_DURATION.record(duration, &[provider_kv, model_kv]);
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", err.category());
                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        provider_kv,
                        model_kv,
                        KeyValue::new("error.type", err.category()),
                    ],
                );
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Backend whose responses are scripted per model.
    #[derive(Default)]
    pub struct ScriptedBackend {
        responses: Mutex<std::collections::HashMap<String, VecDeque<Result<String, CallError>>>>,
        default: Option<String>,
        pub calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedBackend {
        pub fn answering(text: &str) -> Self {
            Self {
                default: Some(text.to_string()),
                ..Default::default()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn script(self, model: &str, response: Result<&str, CallError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(model.to_string())
                .or_default()
                .push_back(response.map(str::to_string));
            self
        }

        pub fn called_models(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Backend for ScriptedBackend {
        async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CallError> {
            self.calls.lock().unwrap().push(req.model.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self
                .responses
                .lock()
                .unwrap()
                .get_mut(&req.model)
                .and_then(VecDeque::pop_front);
            let content = match scripted {
                Some(result) => result?,
                None => match &self.default {
                    Some(text) => text.clone(),
                    None => return Err(CallError::Api(format!("no script for {}", req.model))),
                },
            };
            Ok(Completion {
                content,
                model: req.model.clone(),
                input_tokens: 10,
                output_tokens: 20,
            })
        }

        async fn probe(&self) -> Result<ProbeReport, CallError> {
            Ok(ProbeReport {
                models: vec!["whisper-1".to_string(), "gpt-4o-mini".to_string()],
            })
        }
    }

    fn adapter(backend: Arc<ScriptedBackend>) -> ProviderAdapter {
        ProviderAdapter::new(ProviderName::OpenAI, backend, AdapterSettings::default())
            .with_models(vec!["A".to_string(), "B".to_string(), "C".to_string()])
    }

    fn server_error() -> CallError {
        CallError::Status {
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_model_success_short_circuits() {
        let backend = Arc::new(ScriptedBackend::default().script("A", Ok("from A")));
        let completion = adapter(backend.clone()).generate("prompt").await.unwrap();

        assert_eq!(completion.content, "from A");
        assert_eq!(backend.called_models(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_non_quota_failure_falls_through_to_next_model() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("A", Err(server_error()))
                .script("B", Ok("from B"))
                .script("C", Ok("from C")),
        );
        let completion = adapter(backend.clone()).generate("prompt").await.unwrap();

        assert_eq!(completion.content, "from B");
        assert_eq!(completion.model, "B");
        assert_eq!(backend.called_models(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_quota_failure_aborts_loop() {
        let quota = CallError::Status {
            status: 429,
            message: "quota".to_string(),
        };
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("A", Err(quota.clone()))
                .script("B", Ok("from B")),
        );
        let err = adapter(backend.clone()).generate("prompt").await.unwrap_err();

        assert_eq!(
            err,
            ProviderError::QuotaExceeded {
                provider: ProviderName::OpenAI,
                cause: quota,
            }
        );
        assert_eq!(backend.called_models(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_quota_keyword_on_later_model_aborts_loop() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("A", Err(server_error()))
                .script("B", Err(CallError::Api("You exceeded your current quota".to_string())))
                .script("C", Ok("from C")),
        );
        let outcome = adapter(backend.clone()).run("prompt").await;

        assert!(matches!(outcome, FallbackOutcome::QuotaExceeded(_)));
        assert_eq!(backend.called_models(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_all_models_failing_reports_last_error() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("A", Err(server_error()))
                .script("B", Err(CallError::Transport("connection reset".to_string())))
                .script("C", Err(CallError::Malformed("empty".to_string()))),
        );
        let err = adapter(backend.clone()).generate("prompt").await.unwrap_err();

        assert_eq!(
            err,
            ProviderError::ExhaustedAllModels {
                provider: ProviderName::OpenAI,
                last_error: CallError::Malformed("empty".to_string()),
            }
        );
        assert_eq!(backend.called_models(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_single_model_failure_is_exhausted() {
        let backend = Arc::new(ScriptedBackend::default().script(
            "claude-3-sonnet-20240229",
            Err(CallError::Status {
                status: 404,
                message: "not found".to_string(),
            }),
        ));
        let adapter =
            ProviderAdapter::new(ProviderName::Anthropic, backend.clone(), AdapterSettings::default());
        let err = adapter.generate("prompt").await.unwrap_err();

        assert_eq!(err.kind(), "exhausted_all_models");
        assert_eq!(backend.called_models().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_participates_in_fallback() {
        let backend = Arc::new(
            ScriptedBackend::answering("late").with_delay(Duration::from_millis(200)),
        );
        let settings = AdapterSettings {
            call_timeout: Duration::from_millis(20),
            ..AdapterSettings::default()
        };
        let adapter = ProviderAdapter::new(ProviderName::Gemini, backend.clone(), settings)
            .with_models(vec!["A".to_string(), "B".to_string()]);

        let err = adapter.generate("prompt").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::ExhaustedAllModels {
                provider: ProviderName::Gemini,
                last_error: CallError::Timeout(Duration::from_millis(20)),
            }
        );
        assert_eq!(backend.called_models(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_sends_system_instruction_and_settings() {
        struct Capture(Mutex<Option<CompletionRequest>>);

        #[async_trait::async_trait]
        impl Backend for Capture {
            async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CallError> {
                *self.0.lock().unwrap() = Some(req.clone());
                Ok(Completion {
                    content: "ok".to_string(),
                    model: req.model.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }

            async fn probe(&self) -> Result<ProbeReport, CallError> {
                Ok(ProbeReport::default())
            }
        }

        let capture = Arc::new(Capture(Mutex::new(None)));
        ProviderAdapter::new(ProviderName::OpenAI, capture.clone(), AdapterSettings::default())
            .generate("the prompt")
            .await
            .unwrap();

        let sent = capture.0.lock().unwrap().clone().unwrap();
        assert_eq!(sent.model, "gpt-4o-mini");
        assert_eq!(sent.system, SYSTEM_INSTRUCTION);
        assert_eq!(sent.prompt, "the prompt");
        assert_eq!(sent.temperature, 0.7);
        assert_eq!(sent.max_tokens, 3000);
    }

    #[tokio::test]
    async fn test_gate_serialises_calls() {
        let backend =
            Arc::new(ScriptedBackend::answering("ok").with_delay(Duration::from_millis(30)));
        let gate = Arc::new(Semaphore::new(1));
        let adapter = Arc::new(
            ProviderAdapter::new(ProviderName::OpenAI, backend.clone(), AdapterSettings::default())
                .with_gate(gate.clone()),
        );

        let start = Instant::now();
        let (a, b) = tokio::join!(adapter.generate("one"), adapter.generate("two"));
        assert!(a.is_ok() && b.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_full_gate_is_bounded_by_call_timeout() {
        let backend = Arc::new(ScriptedBackend::answering("ok"));
        let gate = Arc::new(Semaphore::new(1));
        let _held = gate.clone().acquire_owned().await.unwrap();

        let settings = AdapterSettings {
            call_timeout: Duration::from_millis(50),
            ..AdapterSettings::default()
        };
        let adapter = ProviderAdapter::new(ProviderName::OpenAI, backend.clone(), settings)
            .with_models(vec!["gpt-4o-mini".to_string()])
            .with_gate(gate);

        let err = tokio::time::timeout(Duration::from_secs(5), adapter.generate("p"))
            .await
            .expect("gate wait must not outlive the call timeout")
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::ExhaustedAllModels {
                provider: ProviderName::OpenAI,
                last_error: CallError::Timeout(Duration::from_millis(50)),
            }
        );
        assert!(backend.called_models().is_empty());
    }
}
