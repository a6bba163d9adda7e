//! The extraction-call boundary.
//!
//! The actual text-extraction backend is an external collaborator; this
//! module only owns the contract. A backend receives an image (a cropped
//! region or a whole page, as PNG bytes) plus a prompt, and either returns
//! extracted text with a preview image, or fails with a structured error.
//! A failed call must leave no partial state behind.

use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;

use crate::error::ExtractError;

pub mod echo;

/// One extraction call's input.
#[derive(Clone, Debug)]
pub struct ExtractRequest {
    /// PNG bytes for the region crop or the full page.
    pub image: Vec<u8>,
    /// The instruction passed to the extraction backend.
    pub prompt: String,
    /// The source document's display name.
    pub filename: String,
    /// The 1-based page number, or `None` for single-page documents.
    pub page_number: Option<u32>,
}

/// One extraction call's output.
#[derive(Clone, Debug)]
pub struct Extraction {
    /// The extracted text.
    pub text: String,
    /// A normalized preview of the image the backend actually processed.
    pub preview_png: Vec<u8>,
    /// The source document's display name, echoed back.
    pub filename: String,
}

/// An extraction backend.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Run one extraction call. The call either fully succeeds or fails
    /// with no extraction performed.
    async fn extract(&self, request: ExtractRequest) -> Result<Extraction, ExtractError>;
}

/// The built-in extractor implementations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Echo the prompt back without calling any backend. For tests and
    /// for exercising the pipeline end to end.
    #[default]
    Echo,
}

impl ExtractorKind {
    /// Instantiate the chosen extractor.
    pub fn create(&self) -> Arc<dyn Extractor> {
        match self {
            ExtractorKind::Echo => Arc::new(echo::EchoExtractor::new()),
        }
    }
}
