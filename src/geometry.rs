//! Geometry engine: pure functions over boxes, rects, and affine transforms.
//!
//! Every layer is described by a [`BoxData`]: an unrotated box (`box_size`,
//! top-left `position`) plus a clockwise `rotate` in degrees applied about
//! the box center. The functions here turn that description into the
//! axis-aligned footprint used for snapping and control boxes, the projected
//! corners used for oriented hit-testing, and the frame-to-frame conversions
//! used by ungroup and frame detach.
//!
//! DEGENERATE INPUT
//! ================
//!
//! Non-finite coordinates are read as zero and zero-size boxes produce
//! zero-area rects, so nothing in this module ever yields `NaN` or an
//! infinity that could leak into stored props.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

/// A point in page or screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise offset by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    /// Vector from `origin` to `self`.
    #[must_use]
    pub fn minus(self, origin: Point) -> Self {
        Self { x: self.x - origin.x, y: self.y - origin.y }
    }

    /// Replace non-finite components with zero.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self { x: finite(self.x), y: finite(self.y) }
    }
}

/// Width and height of an unrotated box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

impl BoxSize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both dimensions multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self { width: self.width * factor, height: self.height * factor }
    }

    /// Width over height, or zero when the box has no height.
    #[must_use]
    pub fn ratio(self) -> f64 {
        safe_div(self.width, self.height)
    }

    #[must_use]
    pub fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned rect with cached centers, as produced by [`bounding_rect`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl Rect {
    #[must_use]
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        let width = (right - left).max(0.0);
        let height = (bottom - top).max(0.0);
        Self {
            x: left,
            y: top,
            width,
            height,
            center_x: left + width / 2.0,
            center_y: top + height / 2.0,
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Smallest rect containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Geometric pose of a layer or control box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxData {
    pub box_size: BoxSize,
    pub position: Point,
    #[serde(default)]
    pub rotate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl BoxData {
    #[must_use]
    pub fn new(box_size: BoxSize, position: Point, rotate: f64) -> Self {
        Self { box_size, position, rotate, scale: None }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            finite(self.position.x) + finite(self.box_size.width) / 2.0,
            finite(self.position.y) + finite(self.box_size.height) / 2.0,
        )
    }

    /// Axis-aligned footprint after rotation.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        bounding_rect(self.box_size, self.position, self.rotate)
    }

    /// The four visual corners after rotating about the center.
    #[must_use]
    pub fn corners(&self) -> Corners {
        visual_corners(self.box_size, &Affine::rotation(self.rotate), self.position)
    }

    /// Stored scale, or 1 when absent or unusable.
    #[must_use]
    pub fn scale_or_one(&self) -> f64 {
        match self.scale {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        }
    }
}

/// Projected corners of a box, clockwise from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Corners {
    pub nw: Point,
    pub ne: Point,
    pub se: Point,
    pub sw: Point,
}

impl Corners {
    #[must_use]
    pub fn as_array(&self) -> [Point; 4] {
        [self.nw, self.ne, self.se, self.sw]
    }
}

// =============================================================================
// AFFINE
// =============================================================================

/// 2×2 linear map plus translation.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`. Rotations are
/// clockwise in a y-down space, matching how layers are displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    #[must_use]
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 }
    }

    #[must_use]
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = finite(degrees).to_radians().sin_cos();
        Self { a: cos, b: sin, c: -sin, d: cos, tx: 0.0, ty: 0.0 }
    }

    #[must_use]
    pub fn scaling(factor: f64) -> Self {
        let f = finite(factor);
        Self { a: f, b: 0.0, c: 0.0, d: f, tx: 0.0, ty: 0.0 }
    }

    #[must_use]
    pub fn translation(x: f64, y: f64) -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: finite(x), ty: finite(y) }
    }

    /// Transform that applies `self` first and then `next`.
    #[must_use]
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(self.a * p.x + self.c * p.y + self.tx, self.b * p.x + self.d * p.y + self.ty)
    }

    /// Apply only the linear part, ignoring translation.
    #[must_use]
    pub fn apply_linear(&self, p: Point) -> Point {
        Point::new(self.a * p.x + self.c * p.y, self.b * p.x + self.d * p.y)
    }

    /// Inverse transform, or `None` when the linear part is singular.
    #[must_use]
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Affine { a, b, c, d, tx: -(a * self.tx + c * self.ty), ty: -(b * self.tx + d * self.ty) })
    }
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// Read a non-finite value as zero.
#[must_use]
pub fn finite(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Division that yields zero instead of an infinity or `NaN`.
#[must_use]
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() { 0.0 } else { finite(num / den) }
}

/// Axis-aligned rect enclosing a box rotated about its own center.
#[must_use]
pub fn bounding_rect(box_size: BoxSize, position: Point, rotate: f64) -> Rect {
    let w = finite(box_size.width).max(0.0);
    let h = finite(box_size.height).max(0.0);
    let (sin, cos) = finite(rotate).to_radians().sin_cos();
    let width = w * cos.abs() + h * sin.abs();
    let height = w * sin.abs() + h * cos.abs();
    let center_x = finite(position.x) + w / 2.0;
    let center_y = finite(position.y) + h / 2.0;
    Rect {
        x: center_x - width / 2.0,
        y: center_y - height / 2.0,
        width,
        height,
        center_x,
        center_y,
    }
}

/// Project a box's corners through `matrix`, taken about the box center.
///
/// `origin` is the unrotated top-left corner of the box in the target space.
/// The matrix translation, if any, is applied on top of the box placement.
#[must_use]
pub fn visual_corners(box_size: BoxSize, matrix: &Affine, origin: Point) -> Corners {
    let hw = finite(box_size.width) / 2.0;
    let hh = finite(box_size.height) / 2.0;
    let cx = finite(origin.x) + hw;
    let cy = finite(origin.y) + hh;
    let project = |dx: f64, dy: f64| {
        let p = matrix.apply(Point::new(dx, dy));
        Point::new(cx + p.x, cy + p.y)
    };
    Corners {
        nw: project(-hw, -hh),
        ne: project(hw, -hh),
        se: project(hw, hh),
        sw: project(-hw, hh),
    }
}

/// Whether `point` lies inside (or on the edge of) a projected quadrilateral.
///
/// A quadrilateral with zero area contains nothing.
#[must_use]
pub fn is_point_inside_box(point: Point, corners: &Corners) -> bool {
    let pts = corners.as_array();
    let area: f64 = (0..4)
        .map(|i| {
            let (p, q) = (pts[i], pts[(i + 1) % 4]);
            p.x * q.y - q.x * p.y
        })
        .sum();
    if area.abs() < 1e-9 || !area.is_finite() {
        return false;
    }
    let mut positive = false;
    let mut negative = false;
    for i in 0..4 {
        let (p, q) = (pts[i], pts[(i + 1) % 4]);
        let cross = (q.x - p.x) * (point.y - p.y) - (q.y - p.y) * (point.x - p.x);
        if cross > 1e-9 {
            positive = true;
        } else if cross < -1e-9 {
            negative = true;
        }
    }
    !(positive && negative)
}

/// Control box enclosing every given layer pose.
///
/// A single pose is returned as-is, rotation included, so single-layer
/// handles follow the layer. Several poses collapse to the union of their
/// rotated footprints with `rotate = 0`. Returns `None` for no poses.
#[must_use]
pub fn control_box_from_layers<I>(boxes: I) -> Option<BoxData>
where
    I: IntoIterator<Item = BoxData>,
{
    let mut iter = boxes.into_iter();
    let first = iter.next()?;
    let mut union = first.bounding_rect();
    let mut count = 1usize;
    for b in iter {
        union = union.union(&b.bounding_rect());
        count += 1;
    }
    if count == 1 {
        return Some(BoxData {
            box_size: BoxSize::new(finite(first.box_size.width), finite(first.box_size.height)),
            position: first.position.sanitized(),
            rotate: finite(first.rotate),
            scale: first.scale,
        });
    }
    Some(BoxData::new(BoxSize::new(union.width, union.height), Point::new(union.x, union.y), 0.0))
}

/// Pose of `inner` in the parent frame of `outer`.
///
/// `inner` is expressed in the local frame of `outer`: unscaled content
/// coordinates that `outer` scales by its `scale` from its top-left, then
/// rotates by its `rotate` about its center. The returned pose keeps the
/// inner box size in that local unit; multiply by `outer.scale_or_one()` for
/// the on-canvas size.
#[must_use]
pub fn position_of_object_inside_another(outer: &BoxData, inner: &BoxData) -> BoxData {
    let scale = outer.scale_or_one();
    let outer_half = Point::new(finite(outer.box_size.width) / 2.0, finite(outer.box_size.height) / 2.0);
    let local_center = inner.center();
    let from_outer_center = Point::new(local_center.x * scale - outer_half.x, local_center.y * scale - outer_half.y);
    let turned = Affine::rotation(outer.rotate).apply_linear(from_outer_center);
    let outer_center = outer.center();
    let world_center = Point::new(outer_center.x + turned.x, outer_center.y + turned.y);
    let half = Point::new(
        finite(inner.box_size.width) * scale / 2.0,
        finite(inner.box_size.height) * scale / 2.0,
    );
    BoxData {
        box_size: inner.box_size,
        position: Point::new(world_center.x - half.x, world_center.y - half.y),
        rotate: finite(inner.rotate) + finite(outer.rotate),
        scale: inner.scale,
    }
}

/// Whether every corner of `inner` lies inside `outer`.
#[must_use]
pub fn rectangle_inside_another(inner: &BoxData, outer: &BoxData) -> bool {
    let outer_corners = outer.corners();
    inner.corners().as_array().iter().all(|p| is_point_inside_box(*p, &outer_corners))
}

/// Top-left position that centers a box of `size` within `container`.
#[must_use]
pub fn centered_position(container: BoxSize, size: BoxSize) -> Point {
    Point::new(
        finite((container.width - size.width) / 2.0),
        finite((container.height - size.height) / 2.0),
    )
}

/// Size and offset that make content of `content_ratio` cover `container`.
///
/// The content is centered along the overflowing axis.
#[must_use]
pub fn cover_fit(container: BoxSize, content_ratio: f64) -> (BoxSize, Point) {
    let w = finite(container.width);
    let h = finite(container.height);
    if content_ratio <= 0.0 || !content_ratio.is_finite() {
        return (BoxSize::new(w, h), Point::default());
    }
    if container.ratio() > content_ratio {
        let height = w / content_ratio;
        (BoxSize::new(w, height), Point::new(0.0, -(height - h) / 2.0))
    } else {
        let width = h * content_ratio;
        (BoxSize::new(width, h), Point::new(-(width - w) / 2.0, 0.0))
    }
}

/// Direction from `a` to `b` in degrees, clockwise from the +x axis.
#[must_use]
pub fn angle_between_points(a: Point, b: Point) -> f64 {
    finite((b.y - a.y).atan2(b.x - a.x).to_degrees())
}

/// Distance between two screen points converted to page units at `zoom`.
#[must_use]
pub fn distance_between_points(a: Point, b: Point, zoom: f64) -> f64 {
    safe_div((b.x - a.x).hypot(b.y - a.y), zoom)
}

#[must_use]
pub fn normalize_degrees_360(deg: f64) -> f64 {
    finite(deg).rem_euclid(360.0)
}

/// Shortest signed rotation from `start` to `current`, in (-180, 180].
#[must_use]
pub fn signed_angle_delta_deg(current: f64, start: f64) -> f64 {
    let delta = current - start;
    if !delta.is_finite() {
        return 0.0;
    }
    let mut wrapped = delta.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Unsigned angular distance between two headings.
#[must_use]
pub fn angular_delta_deg(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs().rem_euclid(360.0);
    delta.min(360.0 - delta)
}
