//! Integration tests for the snapshot codec and stream framing.
//!
//! These tests drive `linkvue-core` through its public API only, the way a
//! peer does: edit a document, encode it, push it through the framing layer,
//! and decode it into another document.

use std::io::Cursor;

use linkvue_core::{
    decode_document, encode_document, read_frame, write_frame, CodecError, Document, Point,
    Stroke,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn red_stroke(points: &[(f32, f32)]) -> Stroke {
    Stroke::from_points(
        points
            .iter()
            .map(|&(x, y)| Point::new(x, y, [1.0, 0.0, 0.0], 3.0))
            .collect(),
    )
}

/// A document with two strokes, one undone edit and non-default settings.
fn busy_document() -> Document {
    let mut doc = Document::new();
    doc.set_current_color([0.25, 0.5, 0.75]);
    doc.set_canvas_color([0.0, 0.0, 0.125]);
    doc.set_current_thickness(6.5);
    doc.set_zoom(2.5);
    doc.pan_by(-40.0, 12.5);
    doc.append_stroke(red_stroke(&[(0.0, 0.0), (10.0, 10.0)]));
    doc.append_stroke(red_stroke(&[(5.0, 5.0), (6.0, 7.0), (8.0, 9.0)]));
    doc.append_stroke(red_stroke(&[(1.0, 1.0)]));
    assert!(doc.undo());
    doc
}

// ── Round-trip ────────────────────────────────────────────────────────────────

#[test]
fn test_decode_of_encode_reproduces_every_synced_field() {
    // Arrange
    let original = busy_document();

    // Act
    let json = encode_document(&original).expect("encode");
    let mut copy = Document::new();
    decode_document(json.as_bytes(), &mut copy).expect("decode");

    // Assert
    assert_eq!(copy.strokes(), original.strokes());
    assert_eq!(copy.undo_stack(), original.undo_stack());
    assert_eq!(copy.redo_stack(), original.redo_stack());
    assert_eq!(copy.current_color(), original.current_color());
    assert_eq!(copy.canvas_color(), original.canvas_color());
    assert_eq!(copy.current_thickness(), original.current_thickness());
    assert_eq!(copy.zoom(), original.zoom());
    assert_eq!(copy.view_offset(), original.view_offset());
}

#[test]
fn test_decoded_history_keeps_working() {
    // Arrange – the copy should be able to redo what the original undid
    let original = busy_document();
    let json = encode_document(&original).expect("encode");
    let mut copy = Document::new();
    decode_document(json.as_bytes(), &mut copy).expect("decode");

    // Act
    let redone = copy.redo();

    // Assert
    assert!(redone);
    assert_eq!(copy.strokes().len(), 3);
    assert!(copy.redo_stack().is_empty());
}

#[test]
fn test_snapshot_survives_framing() {
    // Arrange
    let json = encode_document(&busy_document()).expect("encode");
    let mut wire = Vec::new();

    // Act
    write_frame(&mut wire, json.as_bytes()).expect("frame");
    let mut reader = Cursor::new(wire);
    let payload = read_frame(&mut reader).expect("read").expect("one frame");
    let mut copy = Document::new();
    decode_document(&payload, &mut copy).expect("decode");

    // Assert
    assert_eq!(copy.strokes(), busy_document().strokes());
    assert!(read_frame(&mut reader).expect("eof").is_none());
}

// ── Malformed input ───────────────────────────────────────────────────────────

#[test]
fn test_malformed_snapshots_leave_document_untouched() {
    let cases: &[&[u8]] = &[
        b"",
        b"not json at all",
        b"[1, 2, 3]",
        br#"{"strokes": "nope"}"#,
        br#"{"strokes": [[{"x": 1, "y": 2, "color": [0,0,0], "thickness": 0}]]}"#,
        br#"{"strokes": [[{"x": 1, "y": 2, "color": [0,0,0], "thickness": -2}]]}"#,
        br#"{"currentThickness": "thick"}"#,
        br#"{"zoom": 0}"#,
        br#"{"canvasColor": [1, 1]}"#,
    ];

    for payload in cases {
        // Arrange
        let mut doc = busy_document();
        let before = doc.clone();

        // Act
        let result = decode_document(payload, &mut doc);

        // Assert
        assert!(
            result.is_err(),
            "{:?} should be rejected",
            String::from_utf8_lossy(payload)
        );
        assert_eq!(doc, before, "document changed by a rejected snapshot");
    }
}

#[test]
fn test_non_object_root_is_reported_as_such() {
    let mut doc = Document::new();
    let result = decode_document(b"42", &mut doc);
    assert!(matches!(result, Err(CodecError::NotAnObject(_))));
}

#[test]
fn test_partial_snapshot_only_replaces_present_keys() {
    // Arrange
    let mut doc = busy_document();
    let strokes_before = doc.strokes().to_vec();

    // Act
    decode_document(br#"{"canvasColor": [0.5, 0.5, 0.5]}"#, &mut doc).expect("decode");

    // Assert
    assert_eq!(doc.canvas_color(), [0.5, 0.5, 0.5]);
    assert_eq!(doc.strokes(), strokes_before.as_slice());
    assert_eq!(doc.current_thickness(), 6.5);
}
