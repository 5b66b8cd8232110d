//! Canvas zoom and pan.
//!
//! Canvas coordinates are what gets stored in a [`Point`](super::document::Point);
//! screen coordinates are what the mouse reports.  The two are related by
//!
//! ```text
//! screen = canvas * zoom + window_origin + offset
//! canvas = (screen - window_origin - offset) / zoom
//! ```

use serde::{Deserialize, Serialize};

/// Smallest zoom factor the wheel can reach.
pub const MIN_ZOOM: f32 = 0.1;
/// Largest zoom factor the wheel can reach.
pub const MAX_ZOOM: f32 = 5.0;
/// Relative zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f32 = 0.1;

/// Zoom factor and pan offset of the canvas view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f32,
    /// Pan offset in screen pixels.
    pub offset: [f32; 2],
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: [0.0, 0.0],
        }
    }
}

impl Viewport {
    /// Applies one mouse-wheel movement, clamping to [`MIN_ZOOM`, `MAX_ZOOM`].
    ///
    /// Positive `wheel` zooms in.
    pub fn zoom_by_wheel(&mut self, wheel: f32) {
        self.zoom = (self.zoom * (1.0 + wheel * WHEEL_ZOOM_STEP)).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Shifts the view by a mouse drag delta in screen pixels.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.offset[0] += dx;
        self.offset[1] += dy;
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn reset_pan(&mut self) {
        self.offset = [0.0, 0.0];
    }

    /// Converts a screen position inside a window at `window_origin` to canvas space.
    pub fn screen_to_canvas(&self, screen: [f32; 2], window_origin: [f32; 2]) -> [f32; 2] {
        [
            (screen[0] - window_origin[0] - self.offset[0]) / self.zoom,
            (screen[1] - window_origin[1] - self.offset[1]) / self.zoom,
        ]
    }

    /// Converts a canvas position to a screen position inside a window at `window_origin`.
    pub fn canvas_to_screen(&self, canvas: [f32; 2], window_origin: [f32; 2]) -> [f32; 2] {
        [
            canvas[0] * self.zoom + window_origin[0] + self.offset[0],
            canvas[1] * self.zoom + window_origin[1] + self.offset[1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport_is_identity() {
        let vp = Viewport::default();
        assert_eq!(vp.screen_to_canvas([10.0, 20.0], [0.0, 0.0]), [10.0, 20.0]);
    }

    #[test]
    fn test_wheel_zoom_is_clamped_at_both_ends() {
        let mut vp = Viewport::default();
        for _ in 0..100 {
            vp.zoom_by_wheel(5.0);
        }
        assert_eq!(vp.zoom, MAX_ZOOM);

        for _ in 0..100 {
            vp.zoom_by_wheel(-5.0);
        }
        assert_eq!(vp.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_single_wheel_notch_scales_by_ten_percent() {
        let mut vp = Viewport::default();
        vp.zoom_by_wheel(1.0);
        assert!((vp.zoom - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_screen_canvas_conversion_is_inverse() {
        // Arrange
        let vp = Viewport {
            zoom: 2.0,
            offset: [15.0, -30.0],
        };
        let origin = [100.0, 50.0];

        // Act
        let canvas = vp.screen_to_canvas([300.0, 250.0], origin);
        let screen = vp.canvas_to_screen(canvas, origin);

        // Assert
        assert_eq!(canvas, [92.5, 115.0]);
        assert_eq!(screen, [300.0, 250.0]);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut vp = Viewport::default();
        vp.pan_by(4.0, 5.0);
        vp.zoom_by_wheel(3.0);

        vp.reset_pan();
        vp.reset_zoom();

        assert_eq!(vp, Viewport::default());
    }
}
