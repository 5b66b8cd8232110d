//! Snapshot-based undo/redo history.
//!
//! Every entry on either stack is a complete copy of the stroke log at one
//! point in time.  Both stacks are ordered most-recent-last, so `push`/`pop`
//! on the underlying `Vec` is the stack discipline.
//!
//! # Linear history (for beginners)
//!
//! ```text
//!   edit:  undo += [current]          redo = []
//!   undo:  redo += [current]          current = undo.pop()
//!   redo:  undo += [current]          current = redo.pop()
//! ```
//!
//! Redo is only meaningful immediately after one or more undos; any new edit
//! throws the redo stack away.
//!
//! # Memory
//!
//! Snapshots are full copies, so memory grows with `strokes × history depth`.
//! A non-zero limit caps the number of entries per stack by discarding the
//! oldest ones.  A limit of `0` keeps everything.

use crate::domain::document::Stroke;

/// Full copy of the stroke log at one point in time.
pub type Snapshot = Vec<Stroke>;

/// Undo and redo stacks of stroke-log snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    /// Maximum entries per stack; `0` = unbounded.
    limit: usize,
}

impl History {
    /// Creates an empty, unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty history holding at most `limit` entries per stack.
    ///
    /// `0` means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Returns the configured per-stack limit (`0` = unbounded).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Records `current` as the state before a new edit and invalidates redo.
    pub fn record(&mut self, current: &[Stroke]) {
        self.undo.push(current.to_vec());
        trim_oldest(&mut self.undo, self.limit);
        self.redo.clear();
    }

    /// Removes and returns the most recent undo entry without touching redo.
    ///
    /// Used to roll back a [`record`](Self::record) whose edit never happened
    /// (for example a stroke that ended without any points).
    pub fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo.pop()
    }

    /// Steps back one edit.
    ///
    /// Moves `current` onto the redo stack and replaces it with the most recent
    /// undo snapshot.  Returns `false` (and leaves everything untouched) when
    /// there is nothing to undo.
    pub fn undo(&mut self, current: &mut Snapshot) -> bool {
        match self.undo.pop() {
            Some(previous) => {
                self.redo.push(std::mem::replace(current, previous));
                trim_oldest(&mut self.redo, self.limit);
                true
            }
            None => false,
        }
    }

    /// Re-applies the most recently undone edit.
    ///
    /// Returns `false` when the redo stack is empty.
    pub fn redo(&mut self, current: &mut Snapshot) -> bool {
        match self.redo.pop() {
            Some(next) => {
                self.undo.push(std::mem::replace(current, next));
                trim_oldest(&mut self.undo, self.limit);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Undo snapshots, most recent last.
    pub fn undo_stack(&self) -> &[Snapshot] {
        &self.undo
    }

    /// Redo snapshots, most recent last.
    pub fn redo_stack(&self) -> &[Snapshot] {
        &self.redo
    }

    /// Replaces the undo stack wholesale (remote snapshot).
    pub fn replace_undo(&mut self, stack: Vec<Snapshot>) {
        self.undo = stack;
        trim_oldest(&mut self.undo, self.limit);
    }

    /// Replaces the redo stack wholesale (remote snapshot).
    pub fn replace_redo(&mut self, stack: Vec<Snapshot>) {
        self.redo = stack;
        trim_oldest(&mut self.redo, self.limit);
    }

    /// Drops every entry on both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

/// Drops entries from the front (oldest) until `stack.len() <= limit`.
fn trim_oldest(stack: &mut Vec<Snapshot>, limit: usize) {
    if limit > 0 && stack.len() > limit {
        let excess = stack.len() - limit;
        stack.drain(..excess);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
