//! Structured errors for the region model and batch orchestration.
//!
//! These are the error kinds consumers need to tell apart: a geometry
//! rejection never aborts a batch, a stale id is tolerated at some call
//! sites and surfaced at others, and a deliberate cancellation must never
//! look like a failure. Everything else travels as [`anyhow::Error`].

use thiserror::Error;

use crate::region::RegionId;

/// Errors from region creation and mutation.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The rectangle was degenerate or out of bounds at creation time.
    /// Rejected before entering the store.
    #[error("invalid region geometry: {detail}")]
    InvalidGeometry { detail: String },

    /// A stale id was referenced. Tolerated as a no-op for delete and
    /// drag paths; surfaced to the caller for explicit updates.
    #[error("region {0} not found")]
    NotFound(RegionId),
}

/// Errors from starting or running a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// `build_work_units` produced nothing to do. A precondition failure,
    /// not a zero-length success.
    #[error("nothing to extract: no regions are defined and whole-page mode is off")]
    NoWorkUnits,
}

/// A failed extraction call, with enough context to message the user.
#[derive(Debug, Error)]
#[error("extraction failed for {filename}{}: {detail}", page_suffix(.page_number))]
pub struct ExtractError {
    /// The document the unit belonged to.
    pub filename: String,
    /// The 1-based page number, if the document is paginated.
    pub page_number: Option<u32>,
    /// Human-readable detail from the extraction backend.
    pub detail: String,
}

fn page_suffix(page_number: &Option<u32>) -> String {
    match page_number {
        Some(n) => format!(" page {n}"),
        None => String::new(),
    }
}
