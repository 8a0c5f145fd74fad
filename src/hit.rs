//! Hit-testing of layers and control-box handles.
//!
//! Layers are tested against their rotated footprint, so a pointer inside the
//! axis-aligned bounding rect but outside the rotated box misses. Handle
//! tests work in the control box's local frame, with slop given in screen
//! pixels and divided by zoom.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::{Layer, LayerId, LayerKind, Page};
use crate::geometry::{Affine, BoxData, Point, finite, is_point_inside_box, safe_div, visual_corners};

/// Which part of a control box was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeAnchor),
    RotateHandle,
}

/// Anchor position for resize handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    /// Corners first so they win over the edges they overlap.
    pub const ALL: [Self; 8] = [Self::Nw, Self::Ne, Self::Se, Self::Sw, Self::N, Self::E, Self::S, Self::W];

    /// -1 for west handles, +1 for east handles, 0 otherwise.
    #[must_use]
    pub fn x_sign(self) -> f64 {
        match self {
            Self::Nw | Self::W | Self::Sw => -1.0,
            Self::Ne | Self::E | Self::Se => 1.0,
            Self::N | Self::S => 0.0,
        }
    }

    /// -1 for north handles, +1 for south handles, 0 otherwise.
    #[must_use]
    pub fn y_sign(self) -> f64 {
        match self {
            Self::Nw | Self::N | Self::Ne => -1.0,
            Self::Sw | Self::S | Self::Se => 1.0,
            Self::E | Self::W => 0.0,
        }
    }

    #[must_use]
    pub fn is_corner(self) -> bool {
        matches!(self, Self::Ne | Self::Se | Self::Sw | Self::Nw)
    }

    /// N and S.
    #[must_use]
    pub fn is_vertical_edge(self) -> bool {
        matches!(self, Self::N | Self::S)
    }
}

/// Handles offered for a selection.
///
/// Multi-selections, groups, frames, and SVGs get corners only. Text has no
/// N or S handle.
#[must_use]
pub fn resize_anchors(layers: &[&Layer]) -> Vec<ResizeAnchor> {
    let corners_only = layers.len() > 1
        || layers.iter().any(|l| matches!(l.kind, LayerKind::Group | LayerKind::Frame | LayerKind::Svg));
    let no_vertical = layers.iter().any(|l| l.kind == LayerKind::Text);
    ResizeAnchor::ALL
        .into_iter()
        .filter(|a| a.is_corner() || !(corners_only || (no_vertical && a.is_vertical_edge())))
        .collect()
}

// =============================================================================
// LAYERS
// =============================================================================

/// Whether `point` (page space) lies on the layer's rotated box.
#[must_use]
pub fn layer_contains(layer: &Layer, point: Point) -> bool {
    let data = layer.box_data();
    let corners = visual_corners(data.box_size, &Affine::rotation(data.rotate), data.position);
    is_point_inside_box(point, &corners)
}

/// Top-most top-level layer under `point`.
#[must_use]
pub fn hit_test(page: &Page, point: Point) -> Option<LayerId> {
    page.top_level()
        .iter()
        .rev()
        .filter_map(|id| page.get(id))
        .find(|layer| layer_contains(layer, point))
        .map(|layer| layer.id.clone())
}

/// Top-most top-level frame under `point`, ignoring `exclude`.
#[must_use]
pub fn hit_frame(page: &Page, point: Point, exclude: &[LayerId]) -> Option<LayerId> {
    page.top_level()
        .iter()
        .rev()
        .filter(|id| !exclude.contains(id))
        .filter_map(|id| page.get(id))
        .find(|layer| layer.kind == LayerKind::Frame && !layer.locked && layer_contains(layer, point))
        .map(|layer| layer.id.clone())
}

// =============================================================================
// CONTROL BOX
// =============================================================================

/// Which handle (or the body) of `control_box` is under `point`. Only the
/// resize handles listed in `anchors` are tested.
///
/// The rotate handle sits below the box's bottom edge, in its rotated frame.
#[must_use]
pub fn hit_control_box(control_box: &BoxData, point: Point, zoom: f64, anchors: &[ResizeAnchor]) -> Option<HitPart> {
    let to_local = Affine::rotation(control_box.rotate).invert()?;
    let center = control_box.center();
    let local = to_local.apply_linear(Point::new(point.x - center.x, point.y - center.y));
    let hw = finite(control_box.box_size.width) / 2.0;
    let hh = finite(control_box.box_size.height) / 2.0;
    let slop = safe_div(HANDLE_RADIUS_PX, zoom);
    let near = |x: f64, y: f64| (local.x - x).hypot(local.y - y) <= slop;

    if near(0.0, hh + safe_div(ROTATE_HANDLE_OFFSET_PX, zoom)) {
        return Some(HitPart::RotateHandle);
    }
    if let Some(anchor) = anchors.iter().copied().find(|a| near(a.x_sign() * hw, a.y_sign() * hh)) {
        return Some(HitPart::ResizeHandle(anchor));
    }
    (local.x.abs() <= hw && local.y.abs() <= hh).then_some(HitPart::Body)
}
