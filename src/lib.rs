//! Draw rectangular regions on document pages and batch-extract their text.
//!
//! The core model keeps region geometry in page-relative percentages, so a
//! region means the same thing at any display size. Pixels only appear at
//! the two edges of the system: pointer input (projected through the
//! current display viewport) and extraction crops (projected at each
//! page's native resolution).
//!
//! The [`batch`] module turns documents plus stored regions into an ordered
//! run of extraction calls, streamed one at a time with cooperative
//! cancellation.

pub mod async_utils;
pub mod batch;
pub mod cmd;
pub mod document;
pub mod error;
pub mod extract;
pub mod gesture;
pub mod geometry;
pub mod interaction;
pub mod job;
pub mod prelude;
pub mod raster;
pub mod region;
pub mod store;
pub mod ui;
