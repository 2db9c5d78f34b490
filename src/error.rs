use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::llm::{InvalidProvider, ProviderError, ValidationError};
use crate::render::{InvalidFormat, RenderError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Validation error: {0}")]
    InvalidProvider(#[from] InvalidProvider),

    #[error("Validation error: {0}")]
    InvalidFormat(#[from] InvalidFormat),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Route not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidProvider(_) | AppError::InvalidFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Provider(ProviderError::QuotaExceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(ProviderError::ExhaustedAllModels { .. }) => StatusCode::BAD_GATEWAY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Render(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error, message) = match &self {
            AppError::Validation(e) => (e.to_string(), None),
            AppError::InvalidProvider(e) => (e.to_string(), None),
            AppError::InvalidFormat(e) => (e.to_string(), None),
            AppError::Provider(e) => {
                tracing::error!(
                    provider = %e.provider(),
                    kind = e.kind(),
                    error = %e,
                    "Generation error"
                );
                ("Failed to generate document".to_string(), Some(e.to_string()))
            }
            AppError::Render(e) => {
                tracing::error!(format = %e.format, error = %e.message, "Render error");
                ("Failed to export document".to_string(), Some(e.to_string()))
            }
            AppError::NotFound => (self.to_string(), None),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("Internal server error".to_string(), None)
            }
        };

        let mut body = json!({
            "error": error,
            "status": status.as_u16(),
        });
        if let Some(message) = message {
            body["message"] = json!(message);
        }
        if let AppError::Provider(e) = &self {
            body["kind"] = json!(e.kind());
        }
        if let Some(trace_id) = get_trace_id() {
            body["trace_id"] = json!(trace_id);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CallError, ProviderName};
    use crate::render::RenderFormat;

    fn quota() -> ProviderError {
        ProviderError::QuotaExceeded {
            provider: ProviderName::OpenAI,
            cause: CallError::Status {
                status: 429,
                message: "quota".to_string(),
            },
        }
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::from(ValidationError::MissingField("context"));
        assert_eq!(
            error.to_string(),
            "Validation error: Missing required field: context"
        );
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                AppError::from(ValidationError::MissingField("type")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(InvalidProvider("x".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(InvalidFormat("txt".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::from(quota()), StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::from(ProviderError::ExhaustedAllModels {
                    provider: ProviderName::Gemini,
                    last_error: CallError::Transport("reset".to_string()),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(RenderError {
                    format: RenderFormat::Pdf,
                    message: "boom".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (
                AppError::Internal("test".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.status(), expected_status, "{error}");
            assert_eq!(error.into_response().status(), expected_status);
        }
    }

    #[test]
    fn test_app_result_err() {
        fn returns_err() -> AppResult<i32> {
            Err(AppError::Internal("test".to_string()))
        }
        assert!(returns_err().is_err());
    }
}
