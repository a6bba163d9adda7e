//! Loaded documents and their rendered page surfaces.
//!
//! A document is one uploaded unit of work: a plain image is a single-page
//! document, a PDF is a multi-page one. Each page carries its raster at
//! native resolution. Region percentages are projected onto that native
//! resolution only here, at the extraction boundary; everything the user
//! sees on screen uses display-resolution projections instead.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::{
    geometry::{PctRect, Viewport},
    prelude::*,
    region::PageKey,
};

/// Whether a document is paginated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    /// A plain image; exactly one page, addressed as [`PageKey::Single`].
    SinglePage,
    /// A paginated source; pages addressed as [`PageKey::Page`] (1-based).
    MultiPage,
}

/// One rendered page at native resolution.
#[derive(Debug)]
pub struct PageSurface {
    image: DynamicImage,
}

impl PageSurface {
    /// Wrap a decoded raster.
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Native width in pixels.
    pub fn native_width(&self) -> u32 {
        self.image.width()
    }

    /// Native height in pixels.
    pub fn native_height(&self) -> u32 {
        self.image.height()
    }

    /// The page's native resolution as a viewport, for projecting region
    /// percentages at the extraction boundary.
    pub fn native_viewport(&self) -> Viewport {
        Viewport::new(f64::from(self.image.width()), f64::from(self.image.height()))
    }

    /// Encode the whole page as PNG bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("failed to encode page as PNG")?;
        Ok(bytes)
    }

    /// Crop a region out of the page and encode it as PNG bytes.
    ///
    /// The percentage rectangle is projected at this page's own native
    /// resolution and truncated to whole pixels only here, at the crop call.
    pub fn crop_png(&self, rect: &PctRect) -> Result<Vec<u8>> {
        let px = self.native_viewport().to_pixels(rect);
        let (x, y, mut width, mut height) = px.to_whole_pixels();
        width = width.min(self.image.width().saturating_sub(x));
        height = height.min(self.image.height().saturating_sub(y));
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "region {rect:?} resolves to an empty crop at {}x{}",
                self.image.width(),
                self.image.height()
            ));
        }
        let cropped = self.image.crop_imm(x, y, width, height);
        let mut bytes = Vec::new();
        cropped
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("failed to encode cropped region as PNG")?;
        Ok(bytes)
    }
}

/// One uploaded document and its rendered pages.
#[derive(Debug)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    pages: Vec<PageSurface>,
}

impl Document {
    /// Create a single-page document from one rendered surface.
    pub fn single_page(name: impl Into<String>, page: PageSurface) -> Self {
        Self {
            name: name.into(),
            kind: DocumentKind::SinglePage,
            pages: vec![page],
        }
    }

    /// Create a multi-page document from rendered pages, in page order.
    pub fn multi_page(name: impl Into<String>, pages: Vec<PageSurface>) -> Result<Self> {
        let name = name.into();
        if pages.is_empty() {
            return Err(anyhow!("document {name:?} has no pages"));
        }
        Ok(Self {
            name,
            kind: DocumentKind::MultiPage,
            pages,
        })
    }

    /// The document's display name (usually its filename).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this document is paginated.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Total number of pages (1 for single-page documents).
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// The rendered surface for a 1-based page number.
    pub fn page(&self, number: u32) -> Option<&PageSurface> {
        self.pages.get(number.checked_sub(1)? as usize)
    }

    /// The region-store key for a 1-based page number.
    ///
    /// Single-page documents behave as "page 1" implicitly, without needing
    /// a real page count.
    pub fn page_key(&self, number: u32) -> PageKey {
        match self.kind {
            DocumentKind::SinglePage => PageKey::Single,
            DocumentKind::MultiPage => PageKey::Page(number),
        }
    }
}
