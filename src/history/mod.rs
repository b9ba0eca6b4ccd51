//! Snapshot-based undo/redo over serialized [`EditorState`] values.

use std::collections::VecDeque;

use thiserror::Error;

use crate::editor::EditorState;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to encode editor snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode editor snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Bounded undo stack whose top is the current state, plus a redo stack.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    undo_stack: VecDeque<String>,
    redo_stack: Vec<String>,
    limit: usize,
    applying: bool,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            applying: false,
        }
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn is_applying(&self) -> bool {
        self.applying
    }

    /// Marks the start of applying a snapshot; `record` is ignored until
    /// [`Self::end_apply`].
    pub fn begin_apply(&mut self) {
        self.applying = true;
    }

    pub fn end_apply(&mut self) {
        self.applying = false;
    }

    /// Pushes a snapshot of `state`. Returns `false` when nothing was recorded:
    /// a snapshot is being applied, or `state` matches the current top.
    pub fn record(&mut self, state: &EditorState) -> Result<bool, SerializationError> {
        if self.applying {
            tracing::trace!("ignoring history record while applying a snapshot");
            return Ok(false);
        }
        let snapshot = serde_json::to_string(state).map_err(SerializationError::Encode)?;
        if self.undo_stack.back() == Some(&snapshot) {
            return Ok(false);
        }

        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
        tracing::trace!(entries = self.undo_stack.len(), "history snapshot recorded");
        Ok(true)
    }

    /// Whether `state` matches the live snapshot: the top entry, or
    /// [`EditorState::empty`] when the undo stack is empty. Selection is ignored.
    pub fn is_current(&self, state: &EditorState) -> Result<bool, SerializationError> {
        let live = match self.undo_stack.back() {
            Some(top) => decode(top)?,
            None => EditorState::empty(),
        };
        Ok(live.same_content(state))
    }

    /// Steps back one snapshot. Undoing the last remaining entry yields
    /// [`EditorState::empty`]; an empty stack yields `None`.
    pub fn undo(&mut self) -> Result<Option<EditorState>, SerializationError> {
        let previous = match self.undo_stack.len() {
            0 => return Ok(None),
            1 => EditorState::empty(),
            len => decode(&self.undo_stack[len - 2])?,
        };

        if let Some(current) = self.undo_stack.pop_back() {
            self.redo_stack.push(current);
        }
        tracing::debug!(
            undo_entries = self.undo_stack.len(),
            redo_entries = self.redo_stack.len(),
            "undo applied"
        );
        Ok(Some(previous))
    }

    pub fn redo(&mut self) -> Result<Option<EditorState>, SerializationError> {
        let Some(snapshot) = self.redo_stack.last() else {
            return Ok(None);
        };
        let state = decode(snapshot)?;

        if let Some(snapshot) = self.redo_stack.pop() {
            self.undo_stack.push_back(snapshot);
            while self.undo_stack.len() > self.limit {
                self.undo_stack.pop_front();
            }
        }
        tracing::debug!(
            undo_entries = self.undo_stack.len(),
            redo_entries = self.redo_stack.len(),
            "redo applied"
        );
        Ok(Some(state))
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    #[cfg(test)]
    fn push_raw(&mut self, snapshot: &str) {
        self.undo_stack.push_back(snapshot.to_string());
    }
}

fn decode(snapshot: &str) -> Result<EditorState, SerializationError> {
    serde_json::from_str(snapshot).map_err(SerializationError::Decode)
}
