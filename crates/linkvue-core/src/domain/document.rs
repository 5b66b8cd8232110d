//! The shared drawing document.
//!
//! A [`Document`] is the only state that has to stay consistent across peers.
//! It holds the ordered stroke log, the undo/redo snapshot history, the brush
//! and canvas settings, and the view transform.
//!
//! # Edit rules
//!
//! - Every local edit first records the current stroke log on the undo stack
//!   and clears the redo stack (see [`History::record`]).
//! - A stroke is started with [`Document::begin_stroke`], extended with
//!   [`Document::add_point`] and finished with [`Document::end_stroke`].  A
//!   stroke that ends without any points is discarded together with the undo
//!   entry that was recorded for it.
//! - Every change that must reach other peers bumps [`Document::revision`].
//!   Panning does not: the pan offset is a per-viewer setting.

use serde::{Deserialize, Serialize};

use crate::domain::history::{History, Snapshot};
use crate::domain::viewport::{Viewport, MAX_ZOOM, MIN_ZOOM};

/// RGB colour with each channel in `0.0..=1.0`.
pub type Color = [f32; 3];

/// Brush thickness range offered to the user.
pub const MIN_THICKNESS: f32 = 1.0;
pub const MAX_THICKNESS: f32 = 20.0;

const DEFAULT_COLOR: Color = [0.0, 0.0, 0.0];
const DEFAULT_CANVAS_COLOR: Color = [1.0, 1.0, 1.0];
const DEFAULT_THICKNESS: f32 = 2.0;

/// One recorded sample of a stroke, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub color: Color,
    pub thickness: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, color: Color, thickness: f32) -> Self {
        Self {
            x,
            y,
            color,
            thickness,
        }
    }
}

/// A polyline; point order defines the drawn path.
///
/// Serialises as a bare sequence of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// The shared whiteboard document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    strokes: Vec<Stroke>,
    history: History,
    current_color: Color,
    canvas_color: Color,
    current_thickness: f32,
    viewport: Viewport,
    /// `true` between `begin_stroke` and `end_stroke`.
    drawing: bool,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document with unbounded history.
    pub fn new() -> Self {
        Self::with_history_limit(0)
    }

    /// Creates an empty document whose undo/redo stacks hold at most `limit`
    /// snapshots each (`0` = unbounded).
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            strokes: Vec::new(),
            history: History::with_limit(limit),
            current_color: DEFAULT_COLOR,
            canvas_color: DEFAULT_CANVAS_COLOR,
            current_thickness: DEFAULT_THICKNESS,
            viewport: Viewport::default(),
            drawing: false,
            revision: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn undo_stack(&self) -> &[Snapshot] {
        self.history.undo_stack()
    }

    pub fn redo_stack(&self) -> &[Snapshot] {
        self.history.redo_stack()
    }

    pub fn current_color(&self) -> Color {
        self.current_color
    }

    pub fn canvas_color(&self) -> Color {
        self.canvas_color
    }

    pub fn current_thickness(&self) -> f32 {
        self.current_thickness
    }

    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    pub fn view_offset(&self) -> [f32; 2] {
        self.viewport.offset
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Monotonic change counter; bumps on every change other peers should see.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    pub fn set_current_color(&mut self, color: Color) {
        self.current_color = color;
        self.touch();
    }

    pub fn set_canvas_color(&mut self, color: Color) {
        self.canvas_color = color;
        self.touch();
    }

    /// Sets the brush size, clamped to [`MIN_THICKNESS`, `MAX_THICKNESS`].
    pub fn set_current_thickness(&mut self, thickness: f32) {
        self.current_thickness = thickness.clamp(MIN_THICKNESS, MAX_THICKNESS);
        self.touch();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.viewport.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.touch();
    }

    pub fn zoom_by_wheel(&mut self, wheel: f32) {
        if wheel != 0.0 {
            self.viewport.zoom_by_wheel(wheel);
            self.touch();
        }
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_zoom();
        self.touch();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn reset_pan(&mut self) {
        self.viewport.reset_pan();
    }

    /// Converts a screen position to canvas coordinates under the current view.
    pub fn screen_to_canvas(&self, screen: [f32; 2], window_origin: [f32; 2]) -> [f32; 2] {
        self.viewport.screen_to_canvas(screen, window_origin)
    }

    /// Converts a canvas position to screen coordinates under the current view.
    pub fn canvas_to_screen(&self, canvas: [f32; 2], window_origin: [f32; 2]) -> [f32; 2] {
        self.viewport.canvas_to_screen(canvas, window_origin)
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    /// Records the current stroke log on the undo stack and invalidates redo.
    pub fn save_state(&mut self) {
        self.history.record(&self.strokes);
        self.touch();
    }

    /// Starts a new, empty stroke.  No-op while a stroke is already open.
    pub fn begin_stroke(&mut self) {
        if self.drawing {
            return;
        }
        self.save_state();
        self.strokes.push(Stroke::default());
        self.drawing = true;
    }

    /// Appends a point at canvas position `(x, y)` to the open stroke,
    /// opening one first if needed.
    ///
    /// The point takes the current colour, and a thickness divided by the zoom
    /// so the line keeps its on-screen width at the zoom it was drawn at.
    pub fn add_point(&mut self, x: f32, y: f32) {
        if !self.drawing {
            self.begin_stroke();
        }
        let point = Point::new(
            x,
            y,
            self.current_color,
            self.current_thickness / self.viewport.zoom,
        );
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.points.push(point);
            self.touch();
        }
    }

    /// Closes the open stroke.
    ///
    /// A stroke without points is removed again and its undo entry rolled back.
    pub fn end_stroke(&mut self) {
        if !self.drawing {
            return;
        }
        self.drawing = false;
        if self.strokes.last().map_or(false, Stroke::is_empty) {
            self.strokes.pop();
            self.history.pop_undo();
            self.touch();
        }
    }

    /// Appends a finished stroke as a single undoable edit.
    ///
    /// Returns `false` and changes nothing if `stroke` has no points.
    pub fn append_stroke(&mut self, stroke: Stroke) -> bool {
        if stroke.is_empty() {
            return false;
        }
        self.end_stroke();
        self.save_state();
        self.strokes.push(stroke);
        true
    }

    /// Removes every stroke as a single undoable edit.
    pub fn clear(&mut self) {
        self.end_stroke();
        self.save_state();
        self.strokes.clear();
    }

    /// Steps back one edit.  Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.end_stroke();
        let changed = self.history.undo(&mut self.strokes);
        if changed {
            self.touch();
        }
        changed
    }

    /// Re-applies the last undone edit.  Returns `false` when redo is empty.
    pub fn redo(&mut self) -> bool {
        self.end_stroke();
        let changed = self.history.redo(&mut self.strokes);
        if changed {
            self.touch();
        }
        changed
    }

    // ── Remote snapshot application (codec only) ──────────────────────────────

    pub(crate) fn replace_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
        // An open local stroke would otherwise continue into a remote stroke.
        self.drawing = false;
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub(crate) fn replace_current_color(&mut self, color: Color) {
        self.current_color = color;
    }

    pub(crate) fn replace_canvas_color(&mut self, color: Color) {
        self.canvas_color = color;
    }

    // Remote values get the same bounds as the local setters.
    pub(crate) fn replace_current_thickness(&mut self, thickness: f32) {
        self.current_thickness = thickness.clamp(MIN_THICKNESS, MAX_THICKNESS);
    }

    pub(crate) fn replace_zoom(&mut self, zoom: f32) {
        self.viewport.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub(crate) fn replace_view_offset(&mut self, offset: [f32; 2]) {
        self.viewport.offset = offset;
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
