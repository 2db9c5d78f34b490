use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionResponse,
};
use serde::Deserialize;

use super::error::{check_status, transport};
use super::{Backend, CallError, Completion, CompletionRequest, ProbeReport};

/// Chat-completions backend. Serves OpenAI directly and Gemini through its
/// OpenAI-compatible endpoint.
///
/// Requests go out through a plain `reqwest` client rather than the
/// `async_openai::Client`, whose built-in backoff retries rate-limited calls
/// and would hide a 429 from the model fallback loop.
pub struct OpenAIBackend {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAIBackend {
    pub fn new(api_key: &str, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait::async_trait]
impl Backend for OpenAIBackend {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CallError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(req.system.clone()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(req.prompt.clone()),
                name: None,
            }),
        ];

        #[allow(deprecated)]
        let request = CreateChatCompletionRequest {
            model: req.model.clone(),
            messages,
            temperature: Some(req.temperature),
            max_completion_tokens: Some(req.max_tokens),
            ..Default::default()
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let response: CreateChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CallError::Malformed(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| CallError::Malformed("response contained no message content".to_string()))?;

        let (input_tokens, output_tokens) = match &response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (0, 0),
        };

        Ok(Completion {
            content,
            model: response.model,
            input_tokens,
            output_tokens,
        })
    }

    async fn probe(&self) -> Result<ProbeReport, CallError> {
        let response = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport)?;

        let models: ModelsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CallError::Malformed(e.to_string()))?;

        Ok(ProbeReport {
            models: models.data.into_iter().map(|m| m.id).collect(),
        })
    }
}
