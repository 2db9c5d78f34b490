use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::generate::required;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::llm::ValidationError;
use crate::render::{RenderFormat, RenderRequest};

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    pub content: Option<String>,
    pub format: Option<String>,
    pub filename: Option<String>,
}

/// Keeps the name safe inside a quoted `Content-Disposition` value.
fn sanitize_filename(name: Option<String>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

pub async fn export(
    State(state): State<AppState>,
    Json(body): Json<ExportBody>,
) -> AppResult<Response> {
    let content = body
        .content
        .filter(|c| !c.is_empty())
        .ok_or(ValidationError::MissingField("content"))?;
    let format: RenderFormat = required(body.format, "format")?.parse()?;

    let request = RenderRequest {
        content,
        format,
        filename_base: sanitize_filename(body.filename),
    };

    tracing::info!(format = %format, "Exporting document");

    let renderer = state.renderer;
    let result = tokio::task::spawn_blocking(move || renderer.render(&request))
        .await
        .map_err(|e| AppError::Internal(format!("render task failed: {e}")))??;

    tracing::info!(filename = %result.filename, bytes = result.bytes.len(), "Document exported");

    Ok((
        [
            (header::CONTENT_TYPE, result.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", result.filename),
            ),
        ],
        result.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(None), "document");
        assert_eq!(sanitize_filename(Some("  ".to_string())), "document");
        assert_eq!(sanitize_filename(Some("my-prd v2".to_string())), "my-prd v2");
        assert_eq!(sanitize_filename(Some("a\"b/c".to_string())), "a_b_c");
    }
}
