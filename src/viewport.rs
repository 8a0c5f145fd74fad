#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use crate::consts::{ZOOM_MAX, ZOOM_MIN};
use crate::geometry::{Point, safe_div};

/// Where the active page sits on screen and how far it is zoomed.
///
/// `origin` is the page's top-left corner in client pixels.
/// `zoom` is a scale factor (1.0 = one page unit per pixel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { origin: Point::default(), zoom: 1.0 }
    }
}

impl Viewport {
    /// Convert a client-space point (pixels) to page coordinates.
    #[must_use]
    pub fn client_to_page(&self, client: Point) -> Point {
        Point {
            x: safe_div(client.x - self.origin.x, self.zoom),
            y: safe_div(client.y - self.origin.y, self.zoom),
        }
    }

    /// Convert a page-space point to client coordinates (pixels).
    #[must_use]
    pub fn page_to_client(&self, page: Point) -> Point {
        Point {
            x: page.x * self.zoom + self.origin.x,
            y: page.y * self.zoom + self.origin.y,
        }
    }

    /// Convert a client-space distance (pixels) to page units.
    #[must_use]
    pub fn client_dist_to_page(&self, client_dist: f64) -> f64 {
        safe_div(client_dist, self.zoom)
    }

    /// Set the zoom, clamped to the supported range. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        }
    }
}
