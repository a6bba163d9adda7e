//! Batch job descriptions.
//!
//! A job file is the CLI's stand-in for interactive region drawing: it
//! names the documents to process, the regions to extract (in page-relative
//! percentages), and the prompt to send with each extraction call.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    batch::{BatchMode, UnitResult},
    geometry::PctRect,
    prelude::*,
    region::PageKey,
    store::RegionStore,
};

/// A batch extraction job, typically loaded from a JSON file.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    /// The documents to process, in order.
    pub documents: Vec<PathBuf>,

    /// The regions to extract. May be empty when `whole_page` is set.
    #[serde(default)]
    pub regions: Vec<JobRegion>,

    /// Extract each whole page instead of the listed regions.
    #[serde(default)]
    pub whole_page: bool,

    /// The instruction passed to the extraction backend.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

/// One region in a job file, in page-relative percentages (0 to 100).
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JobRegion {
    /// The 1-based page the region applies to. Omit for regions on
    /// single-page documents.
    pub page: Option<u32>,

    /// Left edge, as a percentage of page width.
    pub x: f64,

    /// Top edge, as a percentage of page height.
    pub y: f64,

    /// Width, as a percentage of page width.
    pub width: f64,

    /// Height, as a percentage of page height.
    pub height: f64,
}

/// The default prompt, matching the one used for interactive extraction.
fn default_prompt() -> String {
    "Extract all text from this image.".to_string()
}

impl JobFile {
    /// Load and parse a job file.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read job file {:?}", path.display()))?;
        let job: JobFile = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse job file {:?}", path.display()))?;
        if job.documents.is_empty() {
            return Err(anyhow!("job file {:?} lists no documents", path.display()));
        }
        Ok(job)
    }

    /// The extraction mode this job asks for.
    pub fn mode(&self) -> BatchMode {
        if self.whole_page {
            BatchMode::WholePage
        } else {
            BatchMode::Regions
        }
    }

    /// Build a region store from the job's region list.
    pub fn to_store(&self) -> Result<RegionStore> {
        let mut store = RegionStore::new();
        for region in &self.regions {
            let page = match region.page {
                Some(number) => PageKey::Page(number),
                None => PageKey::Single,
            };
            let rect = PctRect::new(region.x, region.y, region.width, region.height);
            store
                .create_region(page, rect)
                .with_context(|| format!("invalid region {region:?}"))?;
        }
        Ok(store)
    }
}

/// One completed extraction, as written to the JSONL output.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct UnitRecord {
    /// A human-readable label naming the document, page and region.
    pub label: String,

    /// The extracted text.
    pub text: String,

    /// The image the backend processed, as base64-encoded PNG bytes.
    pub preview_png_base64: String,
}

impl From<UnitResult> for UnitRecord {
    fn from(result: UnitResult) -> Self {
        use base64::prelude::{BASE64_STANDARD, Engine as _};
        Self {
            label: result.label.to_string(),
            text: result.text,
            preview_png_base64: BASE64_STANDARD.encode(&result.preview_png),
        }
    }
}
