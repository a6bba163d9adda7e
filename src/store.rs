//! The region store: every annotated rectangle, keyed by page.
//!
//! Regions are kept in insertion order per page. The order only matters for
//! display numbering ("Region 1", "Region 2", ...), not for semantics.

use std::collections::BTreeMap;

use crate::{
    error::RegionError,
    geometry::PctRect,
    prelude::*,
    region::{PageKey, Region, RegionId, RegionIdCounter},
};

/// Minimum region width and height, in percent of the page.
///
/// A usability floor for freshly created regions, not a data invariant:
/// anything this small is almost certainly a slipped click rather than a
/// deliberate selection.
pub const MIN_REGION_PCT: f64 = 0.1;

/// All annotated regions for the loaded document set, keyed by page.
#[derive(Debug, Default)]
pub struct RegionStore {
    pages: BTreeMap<PageKey, Vec<Region>>,
    ids: RegionIdCounter,
}

impl RegionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The regions on a page, in insertion order.
    pub fn regions(&self, page: PageKey) -> &[Region] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All pages that currently have at least one region, in ascending order.
    pub fn pages_with_regions(&self) -> impl Iterator<Item = PageKey> + '_ {
        self.pages
            .iter()
            .filter(|(_, regions)| !regions.is_empty())
            .map(|(page, _)| *page)
    }

    /// Total number of regions across all pages.
    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a region by id, across all pages.
    pub fn find(&self, id: &RegionId) -> Option<&Region> {
        self.pages
            .values()
            .flat_map(|regions| regions.iter())
            .find(|region| &region.id == id)
    }

    /// Validate and append a new region to a page.
    ///
    /// Out-of-range values are clamped into the page; rectangles that come
    /// out degenerate or below the usability floor are rejected. Advances
    /// the global id counter as a side effect.
    pub fn create_region(
        &mut self,
        page: PageKey,
        rect: PctRect,
    ) -> Result<&Region, RegionError> {
        let rect = Self::validated(rect)?;
        let id = self.ids.mint();
        debug!(%id, %page, ?rect, "creating region");
        let regions = self.pages.entry(page).or_default();
        regions.push(Region { id, rect, page });
        Ok(regions.last().expect("just pushed"))
    }

    /// Replace the position and size of an existing region.
    pub fn update_region(
        &mut self,
        id: &RegionId,
        rect: PctRect,
    ) -> Result<(), RegionError> {
        let rect = Self::validated(rect)?;
        let region = self
            .find_mut(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))?;
        debug!(%id, ?rect, "updating region");
        region.rect = rect;
        Ok(())
    }

    /// Translate a region to a new top-left corner, keeping its size.
    ///
    /// The corner is clamped so the rectangle stays within the page on both
    /// axes.
    pub fn move_region(
        &mut self,
        id: &RegionId,
        x_pct: f64,
        y_pct: f64,
    ) -> Result<(), RegionError> {
        let region = self
            .find_mut(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))?;
        region.rect = region.rect.moved_to(x_pct, y_pct);
        Ok(())
    }

    /// Remove a region from whichever page holds it.
    ///
    /// Deletion is idempotent: the user may trigger it twice via the
    /// keyboard and pointer paths, so a missing id is a logged no-op.
    /// Returns whether a region was actually removed.
    pub fn delete_region(&mut self, id: &RegionId) -> bool {
        for regions in self.pages.values_mut() {
            if let Some(pos) = regions.iter().position(|region| &region.id == id) {
                regions.remove(pos);
                debug!(%id, "deleted region");
                return true;
            }
        }
        debug!(%id, "delete for unknown region id ignored");
        false
    }

    /// Remove a whole page and all of its regions.
    pub fn delete_page(&mut self, page: PageKey) {
        self.pages.remove(&page);
    }

    /// Copy every region from a source page onto each target page that
    /// currently has zero regions.
    ///
    /// Pages that already have at least one region are left untouched;
    /// propagation never merges or overwrites. Each copy gets a fresh id,
    /// so later edits to a copy don't affect the source.
    pub fn propagate_to_pages(&mut self, source: PageKey, targets: &[PageKey]) {
        let source_rects: Vec<(RegionId, PctRect)> = self
            .regions(source)
            .iter()
            .map(|region| (region.id.clone(), region.rect))
            .collect();
        if source_rects.is_empty() {
            return;
        }
        for &target in targets {
            if target == source || !self.regions(target).is_empty() {
                continue;
            }
            debug!(%source, %target, count = source_rects.len(), "propagating regions");
            for (source_id, rect) in &source_rects {
                let id = self.ids.mint_copy(source_id, target);
                self.pages.entry(target).or_default().push(Region {
                    id,
                    rect: *rect,
                    page: target,
                });
            }
        }
    }

    /// Convenience copy when the user navigates to a page with no regions.
    ///
    /// The source is always page 1, not the previously viewed page, and the
    /// copy only happens if the target currently has none. This is a
    /// one-time copy, not a live link.
    pub fn populate_on_navigation(&mut self, target: PageKey) {
        if target == PageKey::Page(1) || target == PageKey::Single {
            return;
        }
        self.propagate_to_pages(PageKey::Page(1), &[target]);
    }

    /// Remove every region from every page.
    ///
    /// The id counter keeps increasing monotonically; ids are never reused
    /// within a session.
    pub fn clear_all(&mut self) {
        self.pages.clear();
    }

    fn find_mut(&mut self, id: &RegionId) -> Option<&mut Region> {
        self.pages
            .values_mut()
            .flat_map(|regions| regions.iter_mut())
            .find(|region| &region.id == id)
    }

    fn validated(rect: PctRect) -> Result<PctRect, RegionError> {
        let clamped = rect.clamped_to_page();
        if clamped.width < MIN_REGION_PCT || clamped.height < MIN_REGION_PCT {
            return Err(RegionError::InvalidGeometry {
                detail: format!(
                    "region {:.3}% x {:.3}% is below the minimum size of {MIN_REGION_PCT}%",
                    clamped.width, clamped.height
                ),
            });
        }
        Ok(clamped)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> PctRect {
        PctRect::new(x, y, w, h)
    }

    #[test]
    fn create_appends_in_order() {
        let mut store = RegionStore::new();
        let a = store
            .create_region(PageKey::Page(1), rect(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        let b = store
            .create_region(PageKey::Page(1), rect(20.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        let regions = store.regions(PageKey::Page(1));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, a);
        assert_eq!(regions[1].id, b);
    }

    #[test]
    fn create_clamps_overflow_and_rejects_degenerate() {
        let mut store = RegionStore::new();
        let region = store
            .create_region(PageKey::Single, rect(95.0, 0.0, 20.0, 10.0))
            .unwrap();
        assert!(region.rect.is_within_page());
        assert!((region.rect.width - 5.0).abs() < 1e-9);

        let err = store
            .create_region(PageKey::Single, rect(50.0, 50.0, 0.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, RegionError::InvalidGeometry { .. }));
    }

    #[test]
    fn update_unknown_id_is_an_error() {
        let mut store = RegionStore::new();
        let id = store
            .create_region(PageKey::Single, rect(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        store.delete_region(&id);
        let err = store.update_region(&id, rect(5.0, 5.0, 10.0, 10.0)).unwrap_err();
        assert!(matches!(err, RegionError::NotFound(_)));
    }

    #[test]
    fn move_clamps_translation_only() {
        let mut store = RegionStore::new();
        let id = store
            .create_region(PageKey::Single, rect(10.0, 10.0, 30.0, 20.0))
            .unwrap()
            .id
            .clone();
        store.move_region(&id, 90.0, 95.0).unwrap();
        let region = store.find(&id).unwrap();
        assert!((region.rect.x - 70.0).abs() < 1e-9);
        assert!((region.rect.y - 80.0).abs() < 1e-9);
        assert!((region.rect.width - 30.0).abs() < 1e-9);
        assert!((region.rect.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = RegionStore::new();
        let id = store
            .create_region(PageKey::Single, rect(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        assert!(store.delete_region(&id));
        assert!(!store.delete_region(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn ids_stay_unique_across_create_delete_propagate() {
        // No two live regions ever share an id, and deleted ids are
        // never reassigned.
        let mut store = RegionStore::new();
        let mut seen = HashSet::new();
        for _ in 0..3 {
            let id = store
                .create_region(PageKey::Page(1), rect(0.0, 0.0, 10.0, 10.0))
                .unwrap()
                .id
                .clone();
            assert!(seen.insert(id.clone()));
            store.delete_region(&id);
        }
        store
            .create_region(PageKey::Page(1), rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        store.propagate_to_pages(PageKey::Page(1), &[PageKey::Page(2), PageKey::Page(3)]);
        for page in [PageKey::Page(1), PageKey::Page(2), PageKey::Page(3)] {
            for region in store.regions(page) {
                assert!(seen.insert(region.id.clone()), "duplicate id {}", region.id);
            }
        }
    }

    #[test]
    fn propagation_only_fills_empty_pages() {
        // A target page with at least one region is never altered, and
        // re-running propagation is a no-op.
        let mut store = RegionStore::new();
        store
            .create_region(PageKey::Page(1), rect(10.0, 10.0, 20.0, 20.0))
            .unwrap();
        let existing = store
            .create_region(PageKey::Page(2), rect(50.0, 50.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();

        store.propagate_to_pages(PageKey::Page(1), &[PageKey::Page(2), PageKey::Page(3)]);
        assert_eq!(store.regions(PageKey::Page(2)).len(), 1);
        assert_eq!(store.regions(PageKey::Page(2))[0].id, existing);
        assert_eq!(store.regions(PageKey::Page(3)).len(), 1);

        let page3_before: Vec<_> = store.regions(PageKey::Page(3)).to_vec();
        store.propagate_to_pages(PageKey::Page(1), &[PageKey::Page(2), PageKey::Page(3)]);
        assert_eq!(store.regions(PageKey::Page(3)), page3_before.as_slice());
    }

    #[test]
    fn propagated_copies_are_independent() {
        // Navigating to page 2 with no regions gets a copy
        // with identical geometry but a distinct id; page 3 stays empty.
        let mut store = RegionStore::new();
        let source = store
            .create_region(PageKey::Page(1), rect(10.0, 10.0, 20.0, 20.0))
            .unwrap()
            .id
            .clone();

        store.populate_on_navigation(PageKey::Page(2));
        let copies = store.regions(PageKey::Page(2));
        assert_eq!(copies.len(), 1);
        assert_ne!(copies[0].id, source);
        assert_eq!(copies[0].rect, rect(10.0, 10.0, 20.0, 20.0));
        assert!(store.regions(PageKey::Page(3)).is_empty());

        // Editing the copy leaves the source alone.
        let copy_id = copies[0].id.clone();
        store.update_region(&copy_id, rect(30.0, 30.0, 5.0, 5.0)).unwrap();
        assert_eq!(
            store.find(&source).unwrap().rect,
            rect(10.0, 10.0, 20.0, 20.0)
        );
    }

    #[test]
    fn delete_page_drops_all_of_its_regions() {
        let mut store = RegionStore::new();
        store
            .create_region(PageKey::Page(1), rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        store
            .create_region(PageKey::Page(1), rect(20.0, 0.0, 10.0, 10.0))
            .unwrap();
        store
            .create_region(PageKey::Page(2), rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();

        store.delete_page(PageKey::Page(1));
        assert_eq!(store.len(), 1);
        let pages: Vec<_> = store.pages_with_regions().collect();
        assert_eq!(pages, vec![PageKey::Page(2)]);
    }

    #[test]
    fn clear_all_does_not_reset_ids() {
        let mut store = RegionStore::new();
        let before = store
            .create_region(PageKey::Single, rect(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        store.clear_all();
        assert!(store.is_empty());
        let after = store
            .create_region(PageKey::Single, rect(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .id
            .clone();
        assert_ne!(before, after);
    }
}
