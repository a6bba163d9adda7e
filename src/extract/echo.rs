//! Echo extractor for testing.
//!
//! Echoes the prompt back as the extracted text and returns the input image
//! unchanged as the preview. Lets the whole batch pipeline run end to end
//! without any extraction backend.

use async_trait::async_trait;

use crate::error::ExtractError;

use super::{ExtractRequest, Extraction, Extractor};

/// Echo extractor for testing.
#[derive(Debug, Default)]
pub struct EchoExtractor;

impl EchoExtractor {
    /// Create a new echo extractor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for EchoExtractor {
    async fn extract(&self, request: ExtractRequest) -> Result<Extraction, ExtractError> {
        if request.image.is_empty() {
            return Err(ExtractError {
                filename: request.filename,
                page_number: request.page_number,
                detail: "received an empty image".to_string(),
            });
        }
        Ok(Extraction {
            text: format!("echo: {}", request.prompt),
            preview_png: request.image,
            filename: request.filename,
        })
    }
}
