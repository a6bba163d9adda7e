//! Persisted region annotations and their identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::PctRect;

/// Identifies which page's region list is being read or mutated.
///
/// Single-page documents (plain images) do not carry a real page count, so
/// they get an explicit variant instead of an implicit null sentinel. All
/// region lookups and mutations go through a `PageKey`, never a raw index.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
pub enum PageKey {
    /// The only page of a non-paginated document.
    Single,
    /// A 1-based page number of a paginated document.
    Page(u32),
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Single => write!(f, "single"),
            PageKey::Page(n) => write!(f, "p{n}"),
        }
    }
}

/// A stable region identifier.
///
/// Ids are minted from a monotonically increasing counter and are never
/// reused within a session, even after the region is deleted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RegionId(String);

impl RegionId {
    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mints [`RegionId`]s.
///
/// Owned by the store rather than living in a module-level global, so tests
/// and multiple stores don't share counter state. The counter only ever
/// increases; deleting regions does not wind it back.
#[derive(Debug, Default)]
pub struct RegionIdCounter {
    next: u64,
}

impl RegionIdCounter {
    /// Mint a fresh id for a newly created region.
    pub fn mint(&mut self) -> RegionId {
        let n = self.next;
        self.next += 1;
        RegionId(format!("r{n}"))
    }

    /// Mint a fresh id for a region copied onto another page.
    ///
    /// The id records the source region and target page for debugging, but
    /// uniqueness comes from the counter, so it can never collide with a
    /// live id.
    pub fn mint_copy(&mut self, source: &RegionId, target: PageKey) -> RegionId {
        let n = self.next;
        self.next += 1;
        RegionId(format!("r{n}-copy-{source}-{target}"))
    }
}

/// A user-defined rectangular sub-area of a page.
///
/// The rectangle is stored in page-relative percentages (see [`PctRect`]),
/// so it remains valid when the document is resized or re-rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Stable identifier, unique across the whole store.
    pub id: RegionId,
    /// Position and size in page-relative percentages.
    pub rect: PctRect,
    /// The page this region belongs to.
    pub page: PageKey,
}
