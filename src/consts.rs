//! Shared numeric constants for the editor core.

use std::time::Duration;

// ── Layout ──────────────────────────────────────────────────────

/// Fraction of the page a freshly added image or video fills along its
/// constraining axis.
pub const IMAGE_FILL_RATIO: f64 = 0.8;

/// Fraction of the page a freshly added shape fills along its dominant axis.
pub const SHAPE_FILL_RATIO: f64 = 0.3;

/// Position offset applied to pasted and duplicated layers, in page units.
pub const PASTE_OFFSET: f64 = 10.0;

/// Smallest page width or height accepted by a page-size change.
pub const MIN_PAGE_SIZE: f64 = 100.0;

/// Smallest width or height a resize gesture may produce.
pub const MIN_LAYER_SIZE: f64 = 1.0;

/// Background color of a freshly added page.
pub const DEFAULT_PAGE_COLOR: &str = "#fff";

// ── Snapping ────────────────────────────────────────────────────

/// Snap tolerance in screen pixels; divided by zoom before comparison.
pub const ALIGN_MARGIN_PX: f64 = 4.0;

/// Two snapped coordinates closer than this are considered coincident.
pub const SNAP_EPSILON: f64 = 1e-6;

// ── Gestures ────────────────────────────────────────────────────

/// Pointer travel in screen pixels before an armed gesture becomes active.
pub const DRAG_EPSILON_PX: f64 = 0.5;

/// Minimum spacing between two gesture updates (one animation frame).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Opacity applied to an image while it previews inside a frame.
pub const FRAME_PREVIEW_TRANSPARENCY: f64 = 0.5;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for resize handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Distance below the control box to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 48.0;

// ── Rotation ────────────────────────────────────────────────────

/// Rotation within this many degrees of a cardinal angle snaps onto it.
pub const CARDINAL_SNAP_EPS_DEG: f64 = 6.0;

/// Rotation step while shift is held.
pub const SHIFT_SNAP_STEP_DEG: f64 = 15.0;

// ── History ─────────────────────────────────────────────────────

/// Window inside which throttled commands coalesce into one entry.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);

/// Maximum number of undo entries kept.
pub const HISTORY_CAPACITY: usize = 100;

// ── Viewport ────────────────────────────────────────────────────

/// Smallest zoom factor the viewport accepts.
pub const ZOOM_MIN: f64 = 0.1;

/// Largest zoom factor the viewport accepts.
pub const ZOOM_MAX: f64 = 10.0;
