//! Domain entities for LinkVue.
//!
//! This module contains pure document logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! - **`document`** – The shared drawing: the ordered stroke log plus the
//!   current brush and canvas settings.  Every local edit goes through a
//!   `Document` method so the undo history stays consistent.
//! - **`history`** – Two stacks of full stroke-log snapshots used for undo and
//!   redo.  Snapshots are whole copies, not diffs, which keeps the rules simple
//!   and lets the history travel over the wire unchanged.
//! - **`viewport`** – Zoom/pan state and the conversions between screen pixels
//!   and canvas coordinates.  The UI layer uses these to place new points.

pub mod document;
pub mod history;
pub mod viewport;
