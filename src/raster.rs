//! Load uploaded files into rendered documents.
//!
//! Plain images become single-page documents. PDFs are rasterized to one
//! PNG per page using Poppler's `pdftocairo` CLI tool, then decoded into
//! page surfaces at the requested DPI.

use std::{process::Output, sync::LazyLock};

use clap::Args;
use regex::Regex;
use tokio::process::Command;

use crate::{
    document::{Document, PageSurface},
    prelude::*,
};

/// Image types supported as-is.
const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// PDF MIME type, handled by rasterizing.
const PDF_MIME_TYPE: &str = "application/pdf";

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Options for loading documents.
#[derive(Args, Clone, Debug)]
pub struct LoadOptions {
    /// The DPI to use when rasterizing PDF pages.
    #[clap(long, default_value = "300")]
    pub rasterize_dpi: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { rasterize_dpi: 300 }
    }
}

/// Load a file into a [`Document`], based on the detected MIME type.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_document(path: &Path, options: &LoadOptions) -> Result<Document> {
    let mime_type = get_mime_type(path)?;
    let name = path
        .file_name()
        .with_context(|| format!("failed to get filename from {:?}", path.display()))?
        .to_string_lossy()
        .into_owned();

    if SUPPORTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
        let page = decode_page(path).await?;
        Ok(Document::single_page(name, page))
    } else if mime_type == PDF_MIME_TYPE {
        let pages = rasterize_pdf(path, options.rasterize_dpi).await?;
        Document::multi_page(name, pages)
    } else {
        Err(anyhow!(
            "unsupported MIME type {} for {:?} (supported: PNG, JPEG, PDF)",
            mime_type,
            path.display()
        ))
    }
}

/// Get the MIME type of a file by sniffing its magic bytes.
pub fn get_mime_type(path: &Path) -> Result<String> {
    Ok(infer::get_from_path(path)
        .with_context(|| format!("failed to get MIME type for {:?}", path.display()))?
        .ok_or_else(|| anyhow!("unknown MIME type for {:?}", path.display()))?
        .mime_type()
        .to_string())
}

/// Decode a single image file into a page surface.
async fn decode_page(path: &Path) -> Result<PageSurface> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {:?}", path.display()))?;
    let image = image::load_from_memory(&data)
        .with_context(|| format!("failed to decode {:?}", path.display()))?;
    Ok(PageSurface::new(image))
}

/// Rasterize a PDF into one page surface per page, using Poppler's
/// `pdftocairo` CLI tool.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), dpi))]
async fn rasterize_pdf(path: &Path, dpi: u32) -> Result<Vec<PageSurface>> {
    // Construct an output filename. pdftocairo will add digits to this if
    // there is more than one page.
    let filename = path
        .file_name()
        .context("failed to get filename from PDF path")?;

    // Create a temporary directory to hold the PNG files.
    let tmpdir = tempfile::TempDir::with_prefix("pages")?;
    let out_path = tmpdir.path().join(filename).with_extension("png");

    let mut cmd = Command::new("pdftocairo");
    cmd.arg("-png").arg("-r").arg(dpi.to_string());
    let output = cmd
        .arg(path)
        .arg(out_path)
        .output()
        .await
        .with_context(|| format!("failed to run pdftocairo on {:?}", path.display()))?;
    check_for_command_failure("pdftocairo", &output)?;

    // Collect the page files in lexical order, which matches page order
    // because pdftocairo zero-pads page numbers.
    let mut page_paths = tmpdir
        .path()
        .read_dir()
        .with_context(|| {
            format!("failed to read temporary directory {:?}", tmpdir.path().display())
        })?
        .map(|entry| {
            let entry = entry.with_context(|| {
                format!(
                    "failed to read entry in temporary directory {:?}",
                    tmpdir.path().display()
                )
            })?;
            Ok(entry.path())
        })
        .collect::<Result<Vec<_>>>()?;
    page_paths.sort();

    let mut pages = Vec::with_capacity(page_paths.len());
    for page_path in &page_paths {
        pages.push(decode_page(page_path).await?);
    }
    Ok(pages)
}

/// Check whether a command failed, either by exit code or by printing
/// error lines to stderr.
fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stdout,
        "Standard output from command"
    );
    if !stderr.is_empty() {
        warn!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
    }

    if output.status.success() {
        if stderr.lines().any(is_error_line) {
            return Err(anyhow!(
                "{} printed error output:\n{}",
                command_name,
                stderr,
            ));
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}
