//! Drag gesture: translate the selection with the pointer.
//!
//! DESIGN
//! ======
//! Pointer-down captures every selected layer's start position and the
//! control box, then opens a history transaction. Each admitted sample
//! computes one page-space delta, snaps the moved control box against the
//! unselected siblings (unless shift is held), and merges a position update
//! per layer into the transaction.
//!
//! Release resolves the gesture:
//!
//! - no net movement: the transaction is reverted and the press becomes a
//!   selection click;
//! - a single image or video over a frame: the frame keeps the previewed
//!   content and the image layer is deleted;
//! - control box entirely off the page: the dragged layers are deleted;
//! - otherwise the transaction is committed as one undo step.
//!
//! While a single image or video hovers a frame, the frame shows that media
//! (cover-fitted) and the dragged layer drops to half opacity. Leaving the
//! frame restores both.

#[cfg(test)]
#[path = "drag_test.rs"]
mod drag_test;

use std::time::Instant;

use serde_json::{Value, json};
use tracing::debug;

use crate::command::Command;
use crate::consts::FRAME_PREVIEW_TRANSPARENCY;
use crate::doc::{LayerId, LayerKind, box_size_json, merge_props, point_json};
use crate::engine::{EditorCore, EditorError, GestureKind, SelectMode};
use crate::geometry::{BoxData, BoxSize, Point, Rect, cover_fit, safe_div};
use crate::hit::{hit_frame, hit_test};
use crate::input::{GesturePhase, Modifiers, PointerTrack};
use crate::snap::{Guidelines, SnapEdges, sibling_rects, snap_rect};

/// How a drag ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEnd {
    /// No net movement; the layer under the pointer (if any) was selected.
    Click(Option<LayerId>),
    Moved,
    /// Dropped entirely outside the page.
    Deleted,
    /// A media layer was dropped into a frame and removed.
    DroppedIntoFrame { frame: LayerId },
}

#[derive(Debug, Clone)]
struct FramePreview {
    frame: LayerId,
    key: &'static str,
    /// Frame content before the preview; `Null` when it had none.
    frame_content: Value,
    /// Dragged layer transparency before the preview.
    transparency: Value,
}

#[derive(Debug)]
pub struct DragGesture {
    page: usize,
    ids: Vec<LayerId>,
    starts: Vec<Point>,
    control_start: BoxData,
    track: PointerTrack,
    delta: Point,
    preview: Option<FramePreview>,
}

impl DragGesture {
    /// Arm a drag of the current selection at client point `client`.
    ///
    /// # Errors
    ///
    /// `NothingSelected`, or `PageLocked` / `LayerLocked` when the selection
    /// cannot move.
    pub fn begin(editor: &mut EditorCore, client: Point) -> Result<Self, EditorError> {
        let page = editor.ui.active_page;
        let ids = editor.ui.selected.clone();
        if ids.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        if let Err(err) = editor.ensure_editable(page, &ids) {
            debug!(error = %err, "drag refused");
            return Err(err);
        }
        let starts = editor.selected_layers().iter().map(|l| l.props().position()).collect();
        let control_start = editor.ui.control_box.unwrap_or_default();
        editor.history_begin();
        editor.ui.gesture = Some(GestureKind::Drag);
        Ok(Self {
            page,
            ids,
            starts,
            control_start,
            track: PointerTrack::armed(client, editor.config.frame_interval),
            delta: Point::default(),
            preview: None,
        })
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.track.phase
    }

    /// # Errors
    ///
    /// Propagates a failed position update.
    pub fn update(&mut self, editor: &mut EditorCore, client: Point, modifiers: Modifiers) -> Result<bool, EditorError> {
        self.update_at(editor, client, modifiers, Instant::now())
    }

    /// Feed a pointer sample. Returns `true` when the document was updated.
    ///
    /// # Errors
    ///
    /// Propagates a failed position update.
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

    /// Release the pointer.
    ///
    /// # Errors
    ///
    /// Propagates a failed revert, delete, or pending update.
    pub fn end(mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<DragEnd, EditorError> {
        if self.track.take_pending() {
            self.apply(editor, modifiers)?;
        }
        editor.set_guidelines(Guidelines::default());
        editor.ui.gesture = None;

        if self.track.phase == GesturePhase::Armed || !self.track.moved(editor.config.drag_epsilon_px) {
            self.track.finish(false);
            editor.history_back()?;
            let at = editor.viewport.client_to_page(self.track.start);
            let hit = editor.doc.page(self.page).and_then(|p| hit_test(p, at));
            if let Some(id) = &hit {
                let mode = if modifiers.shift { SelectMode::Toggle } else { SelectMode::Replace };
                editor.select_layers(std::slice::from_ref(id), mode);
            }
            debug!(hit = ?hit, "drag resolved as click");
            return Ok(DragEnd::Click(hit));
        }

        self.track.finish(true);
        if let Some(preview) = self.preview.take() {
            editor.merge(Command::DeleteLayers { page: self.page, ids: self.ids.clone() })?;
            editor.history_commit();
            editor.select_layers(std::slice::from_ref(&preview.frame), SelectMode::Replace);
            debug!(frame = %preview.frame, "media dropped into frame");
            return Ok(DragEnd::DroppedIntoFrame { frame: preview.frame });
        }

        if self.is_off_page(editor.doc.page_size()) {
            editor.merge(Command::DeleteLayers { page: self.page, ids: self.ids.clone() })?;
            editor.history_commit();
            debug!(layers = self.ids.len(), "layers dragged off the page");
            return Ok(DragEnd::Deleted);
        }

        editor.history_commit();
        Ok(DragEnd::Moved)
    }

    /// Abort, restoring every dragged layer.
    ///
    /// # Errors
    ///
    /// Propagates a failed revert.
    pub fn cancel(mut self, editor: &mut EditorCore) -> Result<(), EditorError> {
        self.track.finish(false);
        editor.set_guidelines(Guidelines::default());
        editor.ui.gesture = None;
        editor.history_back()?;
        Ok(())
    }

    // --- Internals ---

    fn apply(&mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<(), EditorError> {
        let from = editor.viewport.client_to_page(self.track.start);
        let to = editor.viewport.client_to_page(self.track.last);
        let mut delta = to.minus(from);

        let start_rect = self.control_start.bounding_rect();
        if modifiers.shift {
            editor.set_guidelines(Guidelines::default());
        } else {
            let moved = translated(&start_rect, delta);
            let targets = editor.doc.page(self.page).map(|p| sibling_rects(p, &self.ids)).unwrap_or_default();
            let snap = snap_rect(&moved, &targets, SnapEdges::ALL, editor.viewport.zoom, editor.config.snap_tolerance_px);
            delta = delta.offset(snap.dx, snap.dy);
            editor.set_guidelines(snap.guidelines);
        }
        self.delta = delta;

        for (id, start) in self.ids.iter().zip(&self.starts) {
            let at = start.offset(delta.x, delta.y);
            editor.merge(Command::SetProp {
                page: self.page,
                ids: vec![id.clone()],
                props: json!({ "position": point_json(at) }),
            })?;
        }
        self.update_frame_preview(editor, to)
    }

    fn is_off_page(&self, page: BoxSize) -> bool {
        let r = translated(&self.control_start.bounding_rect(), self.delta);
        r.right() <= 0.0 || r.x >= page.width || r.bottom() <= 0.0 || r.y >= page.height
    }

    /// Single image or video being dragged, with its media key.
    fn media_layer(&self, editor: &EditorCore) -> Option<(LayerId, &'static str)> {
        let [id] = self.ids.as_slice() else {
            return None;
        };
        let layer = editor.doc.get_layer(self.page, id)?;
        match layer.kind {
            LayerKind::Image | LayerKind::Video => layer.kind.media_key().map(|key| (id.clone(), key)),
            _ => None,
        }
    }

    fn update_frame_preview(&mut self, editor: &mut EditorCore, pointer: Point) -> Result<(), EditorError> {
        let Some((image, key)) = self.media_layer(editor) else {
            return Ok(());
        };
        let over = editor.doc.page(self.page).and_then(|p| hit_frame(p, pointer, &self.ids));
        if over.as_ref() == self.preview.as_ref().map(|p| &p.frame) {
            return Ok(());
        }
        if let Some(previous) = self.preview.take() {
            self.restore_preview(editor, &image, previous)?;
        }
        if let Some(frame) = over {
            self.preview = self.enter_preview(editor, &image, key, frame)?;
        }
        Ok(())
    }

    fn enter_preview(
        &self,
        editor: &mut EditorCore,
        image: &LayerId,
        key: &'static str,
        frame: LayerId,
    ) -> Result<Option<FramePreview>, EditorError> {
        let (Some(image_layer), Some(frame_layer)) =
            (editor.doc.get_layer(self.page, image), editor.doc.get_layer(self.page, &frame))
        else {
            return Ok(None);
        };
        let image_props = image_layer.props();
        let Some(media) = image_props.media(key) else {
            return Ok(None);
        };
        let mut content = image_props.object(key).cloned().unwrap_or_else(|| json!({}));
        let frame_box = frame_layer.box_data();
        let scale = frame_box.scale_or_one();
        let local = BoxSize::new(safe_div(frame_box.box_size.width, scale), safe_div(frame_box.box_size.height, scale));
        let (size, offset) = cover_fit(local, media.box_size.ratio());
        merge_props(
            &mut content,
            &json!({ "boxSize": box_size_json(size), "position": point_json(offset), "rotate": 0.0 }),
        );
        let preview = FramePreview {
            frame: frame.clone(),
            key,
            frame_content: frame_layer.props.get(key).cloned().unwrap_or(Value::Null),
            transparency: image_layer.props.get("transparency").cloned().unwrap_or(Value::Null),
        };

        editor.merge(Command::SetProp { page: self.page, ids: vec![frame.clone()], props: json!({ key: content }) })?;
        editor.merge(Command::SetProp {
            page: self.page,
            ids: vec![image.clone()],
            props: json!({ "transparency": FRAME_PREVIEW_TRANSPARENCY }),
        })?;
        debug!(frame = %frame, "frame preview entered");
        Ok(Some(preview))
    }

    fn restore_preview(&self, editor: &mut EditorCore, image: &LayerId, preview: FramePreview) -> Result<(), EditorError> {
        // Clear first so the original content replaces the preview wholesale.
        editor.merge(Command::SetProp {
            page: self.page,
            ids: vec![preview.frame.clone()],
            props: json!({ preview.key: Value::Null }),
        })?;
        editor.merge(Command::SetProp {
            page: self.page,
            ids: vec![preview.frame.clone()],
            props: json!({ preview.key: preview.frame_content }),
        })?;
        editor.merge(Command::SetProp {
            page: self.page,
            ids: vec![image.clone()],
            props: json!({ "transparency": preview.transparency }),
        })?;
        debug!(frame = %preview.frame, "frame preview left");
        Ok(())
    }
}

fn translated(r: &Rect, delta: Point) -> Rect {
    Rect::from_edges(r.x + delta.x, r.y + delta.y, r.right() + delta.x, r.bottom() + delta.y)
}
