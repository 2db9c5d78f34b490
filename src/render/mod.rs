pub mod docx;
pub mod pdf;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::metrics::{RENDER_BYTES, RENDER_DURATION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Pdf,
    Docx,
    Markdown,
}

impl RenderFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderFormat::Pdf => "pdf",
            RenderFormat::Docx => "docx",
            RenderFormat::Markdown => "markdown",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Pdf => "pdf",
            RenderFormat::Docx => "docx",
            RenderFormat::Markdown => "md",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            RenderFormat::Pdf => "application/pdf",
            RenderFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            RenderFormat::Markdown => "text/markdown",
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid format '{0}'. Supported formats: pdf, docx, markdown")]
pub struct InvalidFormat(pub String);

impl FromStr for RenderFormat {
    type Err = InvalidFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(RenderFormat::Pdf),
            "docx" => Ok(RenderFormat::Docx),
            "markdown" => Ok(RenderFormat::Markdown),
            _ => Err(InvalidFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub content: String,
    pub format: RenderFormat,
    pub filename_base: String,
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to generate {format}: {message}")]
pub struct RenderError {
    pub format: RenderFormat,
    pub message: String,
}

impl RenderError {
    fn new(format: RenderFormat, err: impl fmt::Display) -> Self {
        Self {
            format,
            message: err.to_string(),
        }
    }
}

/// Converts generated markdown-like text into a downloadable payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer;

impl DocumentRenderer {
    #[tracing::instrument(
        name = "docgen render",
        skip(self, request),
        fields(
            render.format = %request.format,
            render.content_bytes = request.content.len(),
            render.bytes,
        )
    )]
    pub fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let start = Instant::now();
        let format = request.format;

        let bytes = match format {
            RenderFormat::Markdown => request.content.as_bytes().to_vec(),
            RenderFormat::Pdf => pdf::encode(&request.content).map_err(|e| RenderError::new(format, e))?,
            RenderFormat::Docx => {
                docx::encode(&docx::parse(&request.content)).map_err(|e| RenderError::new(format, e))?
            }
        };

        let format_kv = KeyValue::new("docgen.render.format", format.as_str());
        RENDER_DURATION.record(start.elapsed().as_secs_f64(), &[format_kv.clone()]);
        RENDER_BYTES.record(bytes.len() as f64, &[format_kv]);
        tracing::Span::current().record("render.bytes", bytes.len());

        Ok(RenderResult {
            filename: format!("{}.{}", request.filename_base, format.extension()),
            content_type: format.content_type(),
            bytes,
        })
    }
}
