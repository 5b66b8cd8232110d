//! JSON codec for whole-document snapshots.
//!
//! One encoded document is one complete snapshot; there is no diff protocol.
//! The same text is used as the wire payload and as the body of messages
//! queued between the network threads and the owning loop.
//!
//! Wire format (every key optional on decode; a missing key keeps the
//! receiver's current value):
//! ```text
//! {
//!   "strokes":          [ [ {"x":..,"y":..,"color":[r,g,b],"thickness":..}, .. ], .. ],
//!   "undoStack":        [ [stroke, ..], .. ],      // most recent last
//!   "redoStack":        [ [stroke, ..], .. ],      // most recent last
//!   "currentColor":     [r, g, b],
//!   "canvasColor":      [r, g, b],
//!   "currentThickness": f32,
//!   "zoom":             f32,
//!   "viewOffset":       [x, y]
//! }
//! ```
//!
//! Decoding is two-phase: the text is parsed and validated into a
//! [`DocumentPatch`] first, and only a fully valid patch is applied.  A
//! malformed payload therefore never leaves a half-updated document behind.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::document::{Color, Document, Stroke};
use crate::domain::history::Snapshot;

/// Errors that can occur while encoding or decoding a document snapshot.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not valid JSON or a field has the wrong shape/type.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("snapshot root must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A field parsed but its value is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Borrowed view of a document in wire layout.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    strokes: &'a [Stroke],
    undo_stack: &'a [Snapshot],
    redo_stack: &'a [Snapshot],
    current_color: Color,
    canvas_color: Color,
    current_thickness: f32,
    zoom: f32,
    view_offset: [f32; 2],
}

/// Serialises the whole document (strokes, both history stacks, settings).
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if serialisation fails.
///
/// # Examples
///
/// ```rust
/// use linkvue_core::{decode_document, encode_document, Document};
///
/// let mut doc = Document::new();
/// doc.add_point(1.0, 2.0);
/// doc.end_stroke();
///
/// let text = encode_document(&doc).unwrap();
/// let mut copy = Document::new();
/// decode_document(text.as_bytes(), &mut copy).unwrap();
/// assert_eq!(copy.strokes(), doc.strokes());
/// ```
pub fn encode_document(doc: &Document) -> Result<String, CodecError> {
    let snapshot = SnapshotRef {
        strokes: doc.strokes(),
        undo_stack: doc.undo_stack(),
        redo_stack: doc.redo_stack(),
        current_color: doc.current_color(),
        canvas_color: doc.canvas_color(),
        current_thickness: doc.current_thickness(),
        zoom: doc.zoom(),
        view_offset: doc.view_offset(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// A parsed, validated snapshot that has not been applied yet.
///
/// `None` fields were absent from the payload and leave the target untouched.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub strokes: Option<Vec<Stroke>>,
    pub undo_stack: Option<Vec<Snapshot>>,
    pub redo_stack: Option<Vec<Snapshot>>,
    pub current_color: Option<Color>,
    pub canvas_color: Option<Color>,
    pub current_thickness: Option<f32>,
    pub zoom: Option<f32>,
    pub view_offset: Option<[f32; 2]>,
}

impl DocumentPatch {
    /// Parses and validates a snapshot payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for invalid JSON, a non-object root, wrongly
    /// shaped fields, or out-of-range numbers.
    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        if !value.is_object() {
            return Err(CodecError::NotAnObject(json_kind(&value)));
        }
        let patch: DocumentPatch = serde_json::from_value(value)?;
        patch.validate()?;
        Ok(patch)
    }

    /// Checks numeric ranges the type system cannot express.
    fn validate(&self) -> Result<(), CodecError> {
        if let Some(strokes) = &self.strokes {
            validate_strokes("strokes", strokes)?;
        }
        for (name, stack) in [("undoStack", &self.undo_stack), ("redoStack", &self.redo_stack)] {
            if let Some(stack) = stack {
                for (i, snapshot) in stack.iter().enumerate() {
                    validate_strokes(&format!("{name}[{i}]"), snapshot)?;
                }
            }
        }
        if let Some(color) = &self.current_color {
            validate_color("currentColor", color)?;
        }
        if let Some(color) = &self.canvas_color {
            validate_color("canvasColor", color)?;
        }
        if let Some(thickness) = self.current_thickness {
            validate_positive("currentThickness", thickness)?;
        }
        if let Some(zoom) = self.zoom {
            validate_positive("zoom", zoom)?;
        }
        if let Some([x, y]) = self.view_offset {
            if !x.is_finite() || !y.is_finite() {
                return Err(invalid("viewOffset", "must be finite"));
            }
        }
        Ok(())
    }

    /// Applies every present field to `doc`, replacing the previous values.
    ///
    /// History stacks are replaced wholesale; strokes are replaced, never
    /// merged.
    pub fn apply_to(self, doc: &mut Document) {
        if let Some(strokes) = self.strokes {
            doc.replace_strokes(strokes);
        }
        if let Some(undo) = self.undo_stack {
            doc.history_mut().replace_undo(undo);
        }
        if let Some(redo) = self.redo_stack {
            doc.history_mut().replace_redo(redo);
        }
        if let Some(color) = self.current_color {
            doc.replace_current_color(color);
        }
        if let Some(color) = self.canvas_color {
            doc.replace_canvas_color(color);
        }
        if let Some(thickness) = self.current_thickness {
            doc.replace_current_thickness(thickness);
        }
        if let Some(zoom) = self.zoom {
            doc.replace_zoom(zoom);
        }
        if let Some(offset) = self.view_offset {
            doc.replace_view_offset(offset);
        }
        doc.touch();
    }
}

/// Decodes `payload` and replaces the matching parts of `doc`.
///
/// On error `doc` is left exactly as it was.
///
/// # Errors
///
/// See [`DocumentPatch::parse`].
pub fn decode_document(payload: &[u8], doc: &mut Document) -> Result<(), CodecError> {
    match DocumentPatch::parse(payload) {
        Ok(patch) => {
            patch.apply_to(doc);
            Ok(())
        }
        Err(e) => {
            debug!("rejected snapshot of {} bytes: {e}", payload.len());
            Err(e)
        }
    }
}

// ── Validation helpers ────────────────────────────────────────────────────────

fn validate_strokes(field: &str, strokes: &[Stroke]) -> Result<(), CodecError> {
    for (s, stroke) in strokes.iter().enumerate() {
        for (p, point) in stroke.points.iter().enumerate() {
            let at = || format!("{field}[{s}][{p}]");
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(invalid(&at(), "coordinates must be finite"));
            }
            validate_color(&at(), &point.color)?;
            validate_positive(&at(), point.thickness)?;
        }
    }
    Ok(())
}

fn validate_color(field: &str, color: &Color) -> Result<(), CodecError> {
    if color.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(invalid(field, "colour channels must be finite"))
    }
}

fn validate_positive(field: &str, value: f32) -> Result<(), CodecError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("expected a positive number, got {value}")))
    }
}

fn invalid(field: &str, reason: &str) -> CodecError {
    CodecError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
