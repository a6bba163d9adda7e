//! The pointer interaction state machine.
//!
//! Resolves raw pointer events into region mutations: start a new selection,
//! drag-move an existing region, click-select a region for editing, or cancel
//! whatever is in progress. Exactly one interaction is live at a time.
//!
//! A committed drawing is *pending* until the user explicitly confirms it;
//! only [`InteractionController::confirm`] writes it to the store. Likewise
//! an edit mirrors one region in a live buffer and leaves the stored region
//! untouched until re-commit.

use crate::{
    gesture::{DEFAULT_DRAG_THRESHOLD_PX, Gesture, GestureTracker},
    geometry::{PctRect, PxRect, Viewport},
    prelude::*,
    region::{PageKey, Region, RegionId},
    store::RegionStore,
};

/// Minimum selection width and height in pixels. Anything smaller on
/// pointer-up is treated as an accidental draw and discarded.
pub const DEFAULT_MIN_SELECTION_PX: f64 = 5.0;

/// Tunables for the interaction controller.
#[derive(Clone, Copy, Debug)]
pub struct InteractionConfig {
    /// Pointer travel above this counts as a drag rather than a click.
    pub drag_threshold_px: f64,
    /// Usability floor for freshly drawn selections.
    pub min_selection_px: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            min_selection_px: DEFAULT_MIN_SELECTION_PX,
        }
    }
}

/// The current interaction mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionState {
    /// Nothing in progress.
    Idle,
    /// A new selection rectangle is being drawn.
    Drawing,
    /// An existing region is following the pointer.
    Dragging(RegionId),
    /// An existing region is loaded into the live-edit buffer.
    Editing(RegionId),
}

/// What a pointer release resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum ReleaseOutcome {
    /// A drawn rectangle is now pending explicit confirmation.
    SelectionPending,
    /// The drawn rectangle was below the minimum size and was discarded.
    SelectionTooSmall,
    /// A dragged region was persisted at its new position.
    Moved(RegionId),
    /// A click on a region body loaded it for editing.
    SelectedForEdit(RegionId),
    /// Nothing relevant was in progress.
    Ignored,
}

/// A drawn rectangle awaiting explicit confirmation.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSelection {
    /// The drawn rectangle, in display pixels.
    pub rect: PxRect,
    /// When set, confirming replaces this region instead of creating one.
    pub replaces: Option<RegionId>,
}

/// State for an in-progress drag of an existing region.
#[derive(Clone, Debug)]
struct DragState {
    /// Pointer offset from the region's top-left at press time, so the
    /// region doesn't jump to the pointer position.
    offset_x: f64,
    offset_y: f64,
    /// The region's rectangle following the pointer, in percentages.
    live: PctRect,
}

/// Resolves pointer events against the region store.
#[derive(Debug)]
pub struct InteractionController {
    config: InteractionConfig,
    state: InteractionState,
    gesture: GestureTracker,
    viewport: Viewport,
    page: PageKey,
    draw_origin: Option<(f64, f64)>,
    /// Drawing rectangle or edit buffer, in display pixels.
    live: Option<PxRect>,
    pending: Option<PendingSelection>,
    /// Survives an `Editing -> Drawing` transition so that confirming the
    /// redrawn rectangle replaces the edited region.
    edit_target: Option<RegionId>,
    drag: Option<DragState>,
}

impl InteractionController {
    /// Create a controller for the given page and display viewport.
    pub fn new(page: PageKey, viewport: Viewport) -> Self {
        Self::with_config(page, viewport, InteractionConfig::default())
    }

    /// Create a controller with custom thresholds.
    pub fn with_config(page: PageKey, viewport: Viewport, config: InteractionConfig) -> Self {
        Self {
            config,
            state: InteractionState::Idle,
            gesture: GestureTracker::new(config.drag_threshold_px),
            viewport,
            page,
            draw_origin: None,
            live: None,
            pending: None,
            edit_target: None,
            drag: None,
        }
    }

    /// The current interaction state.
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// The page whose regions this controller manipulates.
    pub fn page(&self) -> PageKey {
        self.page
    }

    /// The in-progress drawing rectangle or edit buffer, for overlay
    /// rendering.
    pub fn live_rect(&self) -> Option<PxRect> {
        self.live
    }

    /// The drawn rectangle awaiting confirmation, if any.
    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    /// The display rectangle for a region, taking any in-progress drag into
    /// account. Recomputed from percentages on every call, so it is always
    /// correct for the current viewport.
    pub fn display_rect(&self, region: &Region) -> PxRect {
        if let (InteractionState::Dragging(id), Some(drag)) = (&self.state, &self.drag)
            && id == &region.id
        {
            return self.viewport.to_pixels(&drag.live);
        }
        self.viewport.to_pixels(&region.rect)
    }

    /// Update the display viewport after a resize. Stored percentages are
    /// untouched; only projections change.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Navigate to another page.
    ///
    /// Any in-progress interaction is discarded, and if the target page has
    /// no regions yet, page 1's regions are copied onto it.
    pub fn navigate_to(
        &mut self,
        store: &mut RegionStore,
        page: PageKey,
        viewport: Viewport,
    ) {
        self.cancel();
        self.page = page;
        self.viewport = viewport;
        store.populate_on_navigation(page);
    }

    /// Handle a pointer press.
    ///
    /// On a region body this starts a drag; on empty canvas it starts a new
    /// drawing. Any unconfirmed pending selection is discarded.
    pub fn pointer_down(&mut self, store: &RegionStore, x: f64, y: f64) {
        self.pending = None;
        self.gesture.press(x, y);

        // Topmost hit wins; later regions draw over earlier ones.
        let hit = store
            .regions(self.page)
            .iter()
            .rev()
            .find(|region| self.viewport.to_pixels(&region.rect).contains(x, y));

        if let Some(region) = hit {
            let px = self.viewport.to_pixels(&region.rect);
            self.drag = Some(DragState {
                offset_x: x - px.x,
                offset_y: y - px.y,
                live: region.rect,
            });
            self.live = None;
            self.draw_origin = None;
            self.state = InteractionState::Dragging(region.id.clone());
        } else {
            // Keep the edit target: redrawing while editing resizes that
            // region on confirm instead of creating a new one.
            if !matches!(self.state, InteractionState::Editing(_)) {
                self.edit_target = None;
            }
            self.drag = None;
            self.draw_origin = Some((x, y));
            self.live = Some(PxRect::new(x, y, 0.0, 0.0));
            self.state = InteractionState::Drawing;
        }
    }

    /// Handle pointer movement while the button is down.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        match &self.state {
            InteractionState::Drawing => {
                if let Some((ox, oy)) = self.draw_origin {
                    let x = x.clamp(0.0, self.viewport.width);
                    let y = y.clamp(0.0, self.viewport.height);
                    self.live = Some(PxRect::from_corners(ox, oy, x, y));
                }
            }
            InteractionState::Dragging(_) => {
                self.gesture.movement(x, y);
                if let Some(drag) = &mut self.drag {
                    let x_pct = (x - drag.offset_x) / self.viewport.width * 100.0;
                    let y_pct = (y - drag.offset_y) / self.viewport.height * 100.0;
                    drag.live = drag.live.moved_to(x_pct, y_pct);
                }
            }
            _ => {}
        }
    }

    /// Handle a pointer release.
    pub fn pointer_up(&mut self, store: &mut RegionStore, x: f64, y: f64) -> ReleaseOutcome {
        match std::mem::replace(&mut self.state, InteractionState::Idle) {
            InteractionState::Drawing => {
                self.pointer_move_for_drawing_finish(x, y);
                let rect = self.live.take();
                self.draw_origin = None;
                match rect {
                    Some(rect)
                        if rect.width >= self.config.min_selection_px
                            && rect.height >= self.config.min_selection_px =>
                    {
                        self.pending = Some(PendingSelection {
                            rect,
                            replaces: self.edit_target.clone(),
                        });
                        ReleaseOutcome::SelectionPending
                    }
                    _ => {
                        self.edit_target = None;
                        ReleaseOutcome::SelectionTooSmall
                    }
                }
            }
            InteractionState::Dragging(id) => {
                let gesture = self.gesture.release(x, y);
                let drag = self.drag.take();
                match gesture {
                    Gesture::Drag => {
                        if let Some(drag) = drag {
                            // The region may have been deleted while the
                            // pointer was down; a stale id is a no-op.
                            if let Err(err) =
                                store.move_region(&id, drag.live.x, drag.live.y)
                            {
                                debug!(%id, %err, "drop of dragged region ignored");
                            } else {
                                return ReleaseOutcome::Moved(id);
                            }
                        }
                        ReleaseOutcome::Ignored
                    }
                    Gesture::Click => match store.find(&id) {
                        Some(region) => {
                            self.live = Some(self.viewport.to_pixels(&region.rect));
                            self.edit_target = Some(id.clone());
                            self.state = InteractionState::Editing(id.clone());
                            ReleaseOutcome::SelectedForEdit(id)
                        }
                        None => {
                            debug!(%id, "click on deleted region ignored");
                            ReleaseOutcome::Ignored
                        }
                    },
                }
            }
            other => {
                // Editing stays live across stray releases.
                self.state = other;
                ReleaseOutcome::Ignored
            }
        }
    }

    /// Commit the pending selection to the store.
    ///
    /// Creates a new region, or replaces the edited one if the selection was
    /// drawn while a region was loaded for editing. Returns the id of the
    /// affected region, or `None` when nothing was pending.
    pub fn confirm(&mut self, store: &mut RegionStore) -> Result<Option<RegionId>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let pct = self.viewport.to_percent(&pending.rect);
        let id = match pending.replaces {
            Some(id) => {
                store.update_region(&id, pct)?;
                id
            }
            None => store.create_region(self.page, pct)?.id.clone(),
        };
        self.edit_target = None;
        self.live = None;
        self.state = InteractionState::Idle;
        Ok(Some(id))
    }

    /// Discard any in-progress drawing, drag, edit, or pending selection
    /// without mutating the store.
    pub fn cancel(&mut self) {
        self.state = InteractionState::Idle;
        self.gesture.reset();
        self.draw_origin = None;
        self.live = None;
        self.pending = None;
        self.edit_target = None;
        self.drag = None;
    }

    /// Delete a region, regardless of the current interaction state.
    ///
    /// If the deleted region was being dragged or edited, the controller
    /// drops back to idle and discards the live buffer.
    pub fn delete_region(&mut self, store: &mut RegionStore, id: &RegionId) {
        store.delete_region(id);
        let active = match &self.state {
            InteractionState::Dragging(active) | InteractionState::Editing(active) => {
                active == id
            }
            _ => false,
        };
        if active || self.edit_target.as_ref() == Some(id) {
            self.cancel();
        }
        if let Some(pending) = &self.pending
            && pending.replaces.as_ref() == Some(id)
        {
            self.pending = None;
        }
    }

    fn pointer_move_for_drawing_finish(&mut self, x: f64, y: f64) {
        if let Some((ox, oy)) = self.draw_origin {
            let x = x.clamp(0.0, self.viewport.width);
            let y = y.clamp(0.0, self.viewport.height);
            self.live = Some(PxRect::from_corners(ox, oy, x, y));
        }
    }
}
