//! Rotate gesture: turn the selection about the control box center.
//!
//! The rotation delta is the change in pointer angle around the control box
//! center since pointer-down. Each layer orbits that center by the delta and
//! adds it to its own `rotate`; the control box turns with them. The
//! resulting angle snaps onto cardinal directions, or onto 15 degree steps
//! while shift is held.

#[cfg(test)]
#[path = "rotate_test.rs"]
mod rotate_test;

use std::time::Instant;

use serde_json::json;
use tracing::debug;

use crate::command::Command;
use crate::consts::{CARDINAL_SNAP_EPS_DEG, SHIFT_SNAP_STEP_DEG};
use crate::doc::{Layer, point_json};
use crate::engine::{EditorCore, EditorError, GestureKind};
use crate::geometry::{
    Affine, BoxData, Point, angle_between_points, angular_delta_deg, normalize_degrees_360, signed_angle_delta_deg,
};
use crate::input::{GesturePhase, Modifiers, PointerTrack};

/// Snap a rotation in degrees; the result is in `[0, 360)`.
#[must_use]
pub fn snap_rotation(raw_deg: f64, shift: bool) -> f64 {
    let mut deg = normalize_degrees_360(raw_deg);
    if let Some(cardinal) =
        [0.0, 90.0, 180.0, 270.0].into_iter().find(|t| angular_delta_deg(deg, *t) <= CARDINAL_SNAP_EPS_DEG)
    {
        deg = cardinal;
    }
    if shift {
        deg = (deg / SHIFT_SNAP_STEP_DEG).round() * SHIFT_SNAP_STEP_DEG;
    }
    normalize_degrees_360(deg)
}

#[derive(Debug)]
pub struct RotateGesture {
    page: usize,
    layers: Vec<Layer>,
    control_start: BoxData,
    center: Point,
    start_angle: f64,
    track: PointerTrack,
    delta: f64,
}

impl RotateGesture {
    /// Arm a rotation of the current selection.
    ///
    /// # Errors
    ///
    /// `NothingSelected`, or a lock error when the selection cannot change.
    pub fn begin(editor: &mut EditorCore, client: Point) -> Result<Self, EditorError> {
        let page = editor.ui.active_page;
        let ids = editor.ui.selected.clone();
        if ids.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        if let Err(err) = editor.ensure_editable(page, &ids) {
            debug!(error = %err, "rotate refused");
            return Err(err);
        }
        let layers: Vec<Layer> = editor.selected_layers().into_iter().cloned().collect();
        let control_start = editor.ui.control_box.unwrap_or_default();
        let center = control_start.center();
        let start_angle = angle_between_points(center, editor.viewport.client_to_page(client));
        editor.history_begin();
        editor.ui.gesture = Some(GestureKind::Rotate);
        Ok(Self {
            page,
            layers,
            control_start,
            center,
            start_angle,
            track: PointerTrack::armed(client, editor.config.frame_interval),
            delta: 0.0,
        })
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.track.phase
    }

    /// # Errors
    ///
    /// Propagates a failed rotation update.
    pub fn update(&mut self, editor: &mut EditorCore, client: Point, modifiers: Modifiers) -> Result<bool, EditorError> {
        self.update_at(editor, client, modifiers, Instant::now())
    }

    /// Feed a pointer sample. Returns `true` when the document was updated.
    ///
    /// # Errors
    ///
    /// Propagates a failed rotation update.
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

    /// Release the pointer. Returns `true` when a rotation was committed.
    ///
    /// # Errors
    ///
    /// Propagates a failed revert or pending update.
    pub fn end(mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<bool, EditorError> {
        if self.track.take_pending() {
            self.apply(editor, modifiers)?;
        }
        editor.ui.gesture = None;
        if self.delta.abs() < f64::EPSILON {
            self.track.finish(false);
            editor.history_back()?;
            return Ok(false);
        }
        self.track.finish(true);
        editor.history_commit();
        debug!(layers = self.layers.len(), delta = self.delta, "rotation committed");
        Ok(true)
    }

    fn apply(&mut self, editor: &mut EditorCore, modifiers: Modifiers) -> Result<(), EditorError> {
        let pointer = editor.viewport.client_to_page(self.track.last);
        let turned = signed_angle_delta_deg(angle_between_points(self.center, pointer), self.start_angle);
        let target = snap_rotation(self.control_start.rotate + turned, modifiers.shift);
        self.delta = signed_angle_delta_deg(target, self.control_start.rotate);

        let orbit = Affine::rotation(self.delta);
        for layer in &self.layers {
            let start = layer.box_data();
            let c = start.center();
            let moved = orbit.apply_linear(c.minus(self.center));
            let position = Point::new(
                self.center.x + moved.x - start.box_size.width / 2.0,
                self.center.y + moved.y - start.box_size.height / 2.0,
            );
            let rotate = normalize_degrees_360(start.rotate + self.delta);
            editor.merge(Command::SetProp {
                page: self.page,
                ids: vec![layer.id.clone()],
                props: json!({ "position": point_json(position), "rotate": rotate }),
            })?;
        }
        editor.set_control_box(Some(BoxData { rotate: target, ..self.control_start }));
        Ok(())
    }
}
