//! Edge and center snapping against sibling layers.
//!
//! DESIGN
//! ======
//! The moving box and every unselected top-level sibling are reduced to
//! their axis-aligned footprints. Each axis has three reference lines
//! (left/right/center-x, top/bottom/center-y). A pair of references is a
//! candidate when their rounded coordinates are within the tolerance, which
//! is given in screen pixels and divided by zoom.
//!
//! Per axis the greatest signed candidate offset wins, which makes the result
//! independent of sibling iteration order. Guidelines are emitted after the
//! offset is applied: for each sibling, the first reference pair that now
//! coincides produces one line spanning both boxes.

#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;

use serde::{Deserialize, Serialize};

use crate::consts::SNAP_EPSILON;
use crate::doc::{LayerId, Page};
use crate::geometry::{Rect, safe_div};

// =============================================================================
// TYPES
// =============================================================================

/// Vertical line at `x`, from `y1` to `y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalGuideline {
    pub x: f64,
    pub y1: f64,
    pub y2: f64,
}

/// Horizontal line at `y`, from `x1` to `x2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalGuideline {
    pub y: f64,
    pub x1: f64,
    pub x2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guidelines {
    pub vertical: Vec<VerticalGuideline>,
    pub horizontal: Vec<HorizontalGuideline>,
}

impl Guidelines {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertical.is_empty() && self.horizontal.is_empty()
    }
}

/// Which reference lines of the moving box take part in snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SnapEdges {
    pub left: bool,
    pub right: bool,
    pub center_x: bool,
    pub top: bool,
    pub bottom: bool,
    pub center_y: bool,
}

impl SnapEdges {
    /// Every edge and both centers; used while dragging.
    pub const ALL: Self = Self { left: true, right: true, center_x: true, top: true, bottom: true, center_y: true };

    pub const NONE: Self =
        Self { left: false, right: false, center_x: false, top: false, bottom: false, center_y: false };

    fn x_mask(self) -> [bool; 3] {
        [self.left, self.right, self.center_x]
    }

    fn y_mask(self) -> [bool; 3] {
        [self.top, self.bottom, self.center_y]
    }
}

/// Correction to apply to the moving box, plus the lines to draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snap {
    pub dx: f64,
    pub dy: f64,
    pub guidelines: Guidelines,
}

// =============================================================================
// SNAPPING
// =============================================================================

/// Whether two coordinates are close enough to snap at `zoom`.
#[must_use]
pub fn is_in_range(a: f64, b: f64, zoom: f64, tolerance_px: f64) -> bool {
    (a.round() - b.round()).abs() <= safe_div(tolerance_px, zoom)
}

fn x_refs(r: &Rect) -> [f64; 3] {
    [r.x, r.right(), r.center_x]
}

fn y_refs(r: &Rect) -> [f64; 3] {
    [r.y, r.bottom(), r.center_y]
}

/// Greatest qualifying `target - active` over every sibling and enabled
/// reference pair.
fn best_offset<F>(active: &Rect, targets: &[Rect], mask: [bool; 3], refs: F, zoom: f64, tolerance_px: f64) -> f64
where
    F: Fn(&Rect) -> [f64; 3],
{
    let mine = refs(active);
    let mut best: Option<f64> = None;
    for target in targets {
        for (a, _) in mine.iter().zip(mask).filter(|(_, on)| *on) {
            for t in refs(target) {
                if is_in_range(*a, t, zoom, tolerance_px) {
                    let offset = t - a;
                    best = Some(best.map_or(offset, |b| b.max(offset)));
                }
            }
        }
    }
    best.unwrap_or(0.0)
}

/// First reference line of `target` that an enabled line of `active` lands on.
fn landed<F>(active: &Rect, target: &Rect, mask: [bool; 3], refs: F) -> Option<f64>
where
    F: Fn(&Rect) -> [f64; 3],
{
    let theirs = refs(target);
    refs(active)
        .into_iter()
        .zip(mask)
        .filter(|(_, on)| *on)
        .find_map(|(a, _)| theirs.into_iter().find(|t| (a - t).abs() < SNAP_EPSILON))
}

/// Snap `active` against `targets`.
#[must_use]
pub fn snap_rect(active: &Rect, targets: &[Rect], edges: SnapEdges, zoom: f64, tolerance_px: f64) -> Snap {
    let dx = best_offset(active, targets, edges.x_mask(), x_refs, zoom, tolerance_px);
    let dy = best_offset(active, targets, edges.y_mask(), y_refs, zoom, tolerance_px);
    let moved = Rect::from_edges(active.x + dx, active.y + dy, active.right() + dx, active.bottom() + dy);

    let mut guidelines = Guidelines::default();
    for target in targets {
        if let Some(x) = landed(&moved, target, edges.x_mask(), x_refs) {
            guidelines.vertical.push(VerticalGuideline {
                x,
                y1: moved.y.min(target.y),
                y2: moved.bottom().max(target.bottom()),
            });
        }
        if let Some(y) = landed(&moved, target, edges.y_mask(), y_refs) {
            guidelines.horizontal.push(HorizontalGuideline {
                y,
                x1: moved.x.min(target.x),
                x2: moved.right().max(target.right()),
            });
        }
    }
    Snap { dx, dy, guidelines }
}

/// Footprints of the top-level layers not in `exclude`.
#[must_use]
pub fn sibling_rects(page: &Page, exclude: &[LayerId]) -> Vec<Rect> {
    page.top_level()
        .iter()
        .filter(|id| !exclude.contains(id))
        .filter_map(|id| page.get(id))
        .map(|layer| layer.box_data().bounding_rect())
        .collect()
}
