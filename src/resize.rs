//! Resize gesture: drag a control-box handle to change layer boxes.
//!
//! DESIGN
//! ======
//! [`resize_box`] is the pure core: it moves the dragged handle by a
//! page-space delta expressed in the box's rotated frame, keeps the opposite
//! handle fixed on the page, and enforces a minimum size. With `keep_ratio`
//! the dominant axis drives a uniform factor.
//!
//! The gesture keeps the aspect ratio for corner handles, for multi-layer
//! selections, and while shift is held. Handles missing from
//! [`resize_anchors`](crate::hit::resize_anchors) are refused up front. A uniform resize scales content:
//! layers with a `scale` (and groups) multiply it, media layers scale their
//! crop box. A free resize of a media layer crops instead: the media stays
//! put on the page, grows only as far as needed to cover the new box, and is
//! clamped so no empty area shows.
//!
//! Snapping applies to the moved edges only, and only for unrotated boxes.

#[cfg(test)]
#[path = "resize_test.rs"]
mod resize_test;

use std::time::Instant;

use serde_json::{Value, json};
use tracing::debug;

use crate::command::Command;
use crate::consts::MIN_LAYER_SIZE;
use crate::doc::{Layer, LayerId, LayerKind, box_size_json, point_json};
use crate::engine::{EditorCore, EditorError, GestureKind};
use crate::geometry::{Affine, BoxData, BoxSize, Point, finite, safe_div};
use crate::hit::ResizeAnchor;
use crate::input::{GesturePhase, Modifiers, PointerTrack};
use crate::snap::{Guidelines, SnapEdges, sibling_rects, snap_rect};

// =============================================================================
// GEOMETRY
// =============================================================================

/// Box after dragging `anchor` by `delta` (page space).
#[must_use]
pub fn resize_box(start: &BoxData, anchor: ResizeAnchor, delta: Point, keep_ratio: bool, min: f64) -> BoxData {
    let (sx, sy) = (anchor.x_sign(), anchor.y_sign());
    let w0 = finite(start.box_size.width);
    let h0 = finite(start.box_size.height);
    let local = Affine::rotation(-start.rotate).apply_linear(delta.sanitized());

    let mut w = w0 + sx * local.x;
    let mut h = h0 + sy * local.y;
    if keep_ratio && w0 > 0.0 && h0 > 0.0 {
        let fx = w / w0;
        let fy = h / h0;
        let factor = if sx == 0.0 {
            fy
        } else if sy == 0.0 || (fx - 1.0).abs() >= (fy - 1.0).abs() {
            fx
        } else {
            fy
        };
        let factor = factor.max(min / w0).max(min / h0);
        w = w0 * factor;
        h = h0 * factor;
    } else {
        w = w.max(min);
        h = h.max(min);
    }

    // Opposite handle stays fixed; edge handles stay centered on their axis.
    let shift = Point::new(sx * (w - w0) / 2.0, sy * (h - h0) / 2.0);
    let turned = Affine::rotation(start.rotate).apply_linear(shift);
    let center = start.center();
    let new_center = Point::new(center.x + turned.x, center.y + turned.y);
    BoxData {
        box_size: BoxSize::new(w, h),
        position: Point::new(new_center.x - w / 2.0, new_center.y - h / 2.0),
        rotate: start.rotate,
        scale: start.scale,
    }
}

/// Props patch that gives `layer` the box `target`.
///
/// `uniform` resizes scale the content; free resizes crop media. Groups
/// always scale, by the width factor.
#[must_use]
pub fn resize_props(layer: &Layer, target: &BoxData, anchor: ResizeAnchor, uniform: bool) -> Value {
    let start = layer.box_data();
    let mut patch = json!({
        "boxSize": box_size_json(target.box_size),
        "position": point_json(target.position),
    });
    let Some(map) = patch.as_object_mut() else {
        return patch;
    };
    let props = layer.props();
    let media_key = layer.kind.media_key().filter(|key| props.object(key).is_some());

    if uniform || layer.kind == LayerKind::Group {
        let factor = safe_div(target.box_size.width, start.box_size.width);
        if layer.kind == LayerKind::Group || start.scale.is_some() {
            map.insert("scale".to_owned(), json!(start.scale_or_one() * factor));
        } else if let Some((key, media)) = media_key.and_then(|key| props.media(key).map(|m| (key, m))) {
            map.insert(
                key.to_owned(),
                json!({
                    "boxSize": box_size_json(media.box_size.scaled(factor)),
                    "position": point_json(Point::new(media.position.x * factor, media.position.y * factor)),
                }),
            );
        }
    } else if let Some((key, media)) = media_key.and_then(|key| props.media(key).map(|m| (key, m))) {
        map.insert(key.to_owned(), crop_media(&media, &start, target, anchor));
    }
    patch
}

/// Media sub-box after a free resize from `start` to `target`.
fn crop_media(media: &BoxData, start: &BoxData, target: &BoxData, anchor: ResizeAnchor) -> Value {
    let (w, h) = (target.box_size.width, target.box_size.height);
    let mut x = media.position.x;
    let mut y = media.position.y;
    if anchor.x_sign() < 0.0 {
        x += w - start.box_size.width;
    }
    if anchor.y_sign() < 0.0 {
        y += h - start.box_size.height;
    }
    let mut size = media.box_size;
    let cover = safe_div(w, size.width).max(safe_div(h, size.height));
    if cover > 1.0 {
        size = size.scaled(cover);
    }
    let x = x.clamp((w - size.width).min(0.0), 0.0);
    let y = y.clamp((h - size.height).min(0.0), 0.0);
    json!({ "boxSize": box_size_json(size), "position": point_json(Point::new(x, y)) })
}

// =============================================================================
// GESTURE
// =============================================================================

#[derive(Debug)]
pub struct ResizeGesture {
    page: usize,
    anchor: ResizeAnchor,
    layers: Vec<Layer>,
    control_start: BoxData,
    track: PointerTrack,
    changed: bool,
}

impl ResizeGesture {
    /// Arm a resize of the current selection from handle `anchor`.
    ///
    /// # Errors
    ///
    /// `NothingSelected`, or a lock error when the selection cannot change.
    pub fn begin(editor: &mut EditorCore, anchor: ResizeAnchor, client: Point) -> Result<Self, EditorError> {
        let page = editor.ui.active_page;
        let ids = editor.ui.selected.clone();
        if ids.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        if let Err(err) = editor.ensure_editable(page, &ids) {
            debug!(error = %err, "resize refused");
            return Err(err);
        }
        if !editor.resize_anchors().contains(&anchor) {
            debug!(anchor = ?anchor, "resize handle not offered");
            return Err(EditorError::HandleDisabled(anchor));
        }
        let layers: Vec<Layer> = editor.selected_layers().into_iter().cloned().collect();
        let control_start = editor.ui.control_box.unwrap_or_default();
        editor.history_begin();
        editor.ui.gesture = Some(GestureKind::Resize);
        Ok(Self {
            page,
            anchor,
            layers,
            control_start,
            track: PointerTrack::armed(client, editor.config.frame_interval),
            changed: false,
        })
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.track.phase
    }

    /// # Errors
    ///
    /// Propagates a failed box update.
    pub fn update(&mut self, editor: &mut EditorCore, client: Point, modifiers: Modifiers) -> Result<bool, EditorError> {
        self.update_at(editor, client, modifiers, Instant::now())
    }

    /// Feed a pointer sample. Returns `true` when the document was updated.
    ///
    /// # Errors
    ///
    /// Propagates a failed box update.
    pub fn update_at(
        &mut self,
        editor: &mut EditorCore,
        client: Point,
        modifiers: Modifiers,
        now: Instant,
    ) -> Result<bool, EditorError> {
        if !self.track.sample_at(client, editor.config.drag_epsilon_px, now) {
            return Ok(false);
        }
        self.apply(editor, modifiers)?;
        Ok(true)
    }

    /// Release the pointer. Returns `true` when a resize was committed.
    ///
    /// # Errors
    ///
    /// Propagates a failed revert or pending update.
    pub fn end(mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<bool, EditorError> {
        if self.track.take_pending() {
            self.apply(editor, modifiers)?;
        }
        editor.set_guidelines(Guidelines::default());
        editor.ui.gesture = None;
        if !self.changed || !self.track.moved(editor.config.drag_epsilon_px) {
            self.track.finish(false);
            editor.history_back()?;
            return Ok(false);
        }
        self.track.finish(true);
        editor.history_commit();
        debug!(layers = self.layers.len(), anchor = ?self.anchor, "resize committed");
        Ok(true)
    }

    // --- Internals ---

    fn apply(&mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<(), EditorError> {
        let from = editor.viewport.client_to_page(self.track.start);
        let to = editor.viewport.client_to_page(self.track.last);
        let mut delta = to.minus(from);
        let multi = self.layers.len() > 1;
        let uniform = multi || self.anchor.is_corner() || modifiers.shift;

        let mut resized = resize_box(&self.control_start, self.anchor, delta, uniform, MIN_LAYER_SIZE);
        if modifiers.shift || self.control_start.rotate != 0.0 {
            editor.set_guidelines(Guidelines::default());
        } else {
            let ids: Vec<LayerId> = self.layers.iter().map(|l| l.id.clone()).collect();
            let targets = editor.doc.page(self.page).map(|p| sibling_rects(p, &ids)).unwrap_or_default();
            let edges = SnapEdges {
                left: self.anchor.x_sign() < 0.0,
                right: self.anchor.x_sign() > 0.0,
                top: self.anchor.y_sign() < 0.0,
                bottom: self.anchor.y_sign() > 0.0,
                ..SnapEdges::NONE
            };
            let snap = snap_rect(&resized.bounding_rect(), &targets, edges, editor.viewport.zoom, editor.config.snap_tolerance_px);
            if snap.dx != 0.0 || snap.dy != 0.0 {
                delta = delta.offset(snap.dx, snap.dy);
                resized = resize_box(&self.control_start, self.anchor, delta, uniform, MIN_LAYER_SIZE);
            }
            editor.set_guidelines(snap.guidelines);
        }

        let factor = safe_div(resized.box_size.width, self.control_start.box_size.width);
        let origin = self.control_start.position;
        for layer in &self.layers {
            let target = if multi {
                let start = layer.box_data();
                BoxData {
                    box_size: start.box_size.scaled(factor),
                    position: Point::new(
                        resized.position.x + (start.position.x - origin.x) * factor,
                        resized.position.y + (start.position.y - origin.y) * factor,
                    ),
                    rotate: start.rotate,
                    scale: start.scale,
                }
            } else {
                resized
            };
            let props = resize_props(layer, &target, self.anchor, uniform);
            editor.merge(Command::SetProp { page: self.page, ids: vec![layer.id.clone()], props })?;
        }
        self.changed = resized.box_size != self.control_start.box_size || resized.position != self.control_start.position;
        Ok(())
    }
}
