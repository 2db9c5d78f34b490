use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppResult;
use crate::llm::{GenerationRequest, ProviderName, ValidationError};

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub prompt: Option<String>,
    pub context: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub provider: ProviderName,
    pub model: Option<String>,
    pub mock: bool,
    pub timestamp: DateTime<Utc>,
}

pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ValidationError::MissingField(field))
}

pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> AppResult<Json<GenerateResponse>> {
    let doc_type = required(body.doc_type, "type")?;
    let request = GenerationRequest {
        prompt_template: required(body.prompt, "prompt")?,
        context: required(body.context, "context")?,
        provider_hint: body.provider.as_deref().map(str::parse::<ProviderName>).transpose()?,
    };
    request.validate()?;

    tracing::info!(doc_type = %doc_type, "Generating document");

    let generation = state
        .router
        .generate_with(
            request.provider_hint,
            &request.prompt_template,
            &request.context,
        )
        .await?;

    tracing::info!(
        doc_type = %doc_type,
        provider = %generation.provider,
        mock = generation.mock,
        "Document generated"
    );

    Ok(Json(GenerateResponse {
        success: true,
        content: generation.content,
        doc_type,
        provider: generation.provider,
        model: generation.model,
        mock: generation.mock,
        timestamp: Utc::now(),
    }))
}
