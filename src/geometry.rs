//! Percentage and pixel rectangles, plus viewport projection between them.
//!
//! Regions are persisted as page-relative percentages so they survive window
//! resizes, page navigation, and re-renders. Pixel geometry is always derived
//! on demand from whatever surface is currently displayed. The one inverse
//! conversion happens at selection-commit time, and it must use the rendered
//! (displayed) dimensions, never the native resolution of the source page.
//! Projection to native resolution happens only at the extraction boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A rectangle in page-relative percentages, each coordinate in `[0, 100]`.
///
/// Stored as `f64` with no forced rounding. Truncation to whole pixels is
/// only allowed at the final draw or crop call, to avoid compounding rounding
/// error across repeated resize events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, JsonSchema, Serialize)]
pub struct PctRect {
    /// Left edge, as a percentage of page width.
    pub x: f64,
    /// Top edge, as a percentage of page height.
    pub y: f64,
    /// Width, as a percentage of page width.
    pub width: f64,
    /// Height, as a percentage of page height.
    pub height: f64,
}

impl PctRect {
    /// Create a new percentage rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Does this rectangle lie entirely within the page?
    pub fn is_within_page(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 100.0
            && self.y + self.height <= 100.0
    }

    /// Clamp this rectangle into the page bounds.
    ///
    /// The top-left corner is clamped into `[0, 100]` first, and then the
    /// size is shrunk as needed so the rectangle does not extend past the
    /// page. Degenerate sizes are left for the caller to reject.
    pub fn clamped_to_page(&self) -> Self {
        let x = self.x.clamp(0.0, 100.0);
        let y = self.y.clamp(0.0, 100.0);
        let width = self.width.min(100.0 - x);
        let height = self.height.min(100.0 - y);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Translate this rectangle to a new top-left corner, clamped so that the
    /// rectangle stays within the page given its existing size.
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, (100.0 - self.width).max(0.0)),
            y: y.clamp(0.0, (100.0 - self.height).max(0.0)),
            width: self.width,
            height: self.height,
        }
    }
}

/// A rectangle in pixels, relative to some rendered surface.
///
/// Coordinates stay `f64` until the final draw or crop call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PxRect {
    /// Create a new pixel rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a well-formed rectangle from two opposite corners, in any order.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Does this rectangle contain the given point?
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Truncate to whole-pixel bounds for a draw or crop call.
    ///
    /// This is the only place pixel values lose precision.
    pub fn to_whole_pixels(&self) -> (u32, u32, u32, u32) {
        (
            self.x.max(0.0) as u32,
            self.y.max(0.0) as u32,
            self.width.max(0.0) as u32,
            self.height.max(0.0) as u32,
        )
    }
}

/// The pixel dimensions of whatever surface a page is currently rendered on.
///
/// These change on window resize and on navigation between differently-sized
/// pages, so pixel rectangles must be recomputed from percentages on every
/// render, never cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Rendered width in pixels.
    pub width: f64,
    /// Rendered height in pixels.
    pub height: f64,
}

impl Viewport {
    /// Create a new viewport from rendered pixel dimensions.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Project a percentage rectangle onto this viewport, for overlay
    /// rendering or cropping.
    pub fn to_pixels(&self, rect: &PctRect) -> PxRect {
        PxRect {
            x: rect.x / 100.0 * self.width,
            y: rect.y / 100.0 * self.height,
            width: rect.width / 100.0 * self.width,
            height: rect.height / 100.0 * self.height,
        }
    }

    /// Convert a freshly drawn pixel selection into a percentage rectangle.
    ///
    /// Used exactly once per selection, at commit time, with the displayed
    /// dimensions of the page surface.
    pub fn to_percent(&self, rect: &PxRect) -> PctRect {
        PctRect {
            x: rect.x / self.width * 100.0,
            y: rect.y / self.height * 100.0,
            width: rect.width / self.width * 100.0,
            height: rect.height / self.height * 100.0,
        }
    }
}
