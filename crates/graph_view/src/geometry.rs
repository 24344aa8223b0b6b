//! View transform between world (layout) and screen coordinates.

use graph_core::Position;
use serde::Serialize;

/// Pan and zoom applied when drawing: `screen = world * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    /// Horizontal translation in screen pixels
    pub pan_x: f64,
    /// Vertical translation in screen pixels
    pub pan_y: f64,
    /// Scale factor (1.0 = identity)
    pub zoom: f64,
}

impl ViewTransform {
    /// Smallest zoom accepted; smaller values are clamped.
    pub const MIN_ZOOM: f64 = 0.05;
    /// Largest zoom accepted; larger values are clamped.
    pub const MAX_ZOOM: f64 = 20.0;

    /// Create a transform, clamping zoom into the supported range.
    pub fn new(pan: Position, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
        } else {
            1.0
        };
        Self {
            pan_x: pan.x,
            pan_y: pan.y,
            zoom,
        }
    }

    /// Map a screen point into world coordinates.
    pub fn screen_to_world(&self, point: Position) -> Position {
        Position::new(
            (point.x - self.pan_x) / self.zoom,
            (point.y - self.pan_y) / self.zoom,
        )
    }

    /// Map a world point onto the screen.
    pub fn world_to_screen(&self, point: Position) -> Position {
        Position::new(
            point.x * self.zoom + self.pan_x,
            point.y * self.zoom + self.pan_y,
        )
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
        }
    }
}
