//! Linear undo/redo over full-board snapshots.

use crate::snapshot::Snapshot;

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Undo and redo stacks of board snapshots.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `limit` undo states (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Push the state from before a change. Clears the redo stack.
    pub fn record(&mut self, before: Snapshot) {
        self.undo_stack.push(before);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.limit {
            let overflow = self.undo_stack.len() - self.limit;
            self.undo_stack.drain(..overflow);
        }
    }

    /// Step back. `current` moves to the redo stack; the returned snapshot should be restored.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::surface::Surface;

    /// A distinguishable 1x1 snapshot.
    fn snap(shade: u8) -> Snapshot {
        let mut surface = Surface::new(1, 1);
        surface.fill(Rgba::opaque(shade, shade, shade));
        Snapshot::capture(&surface).unwrap()
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = History::new();
        history.record(snap(0));

        let restored = history.undo(snap(1)).unwrap();
        assert_eq!(restored, snap(0));
        assert!(!history.can_undo());
        assert!(history.can_redo());

        let again = history.redo(snap(0)).unwrap();
        assert_eq!(again, snap(1));
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new();
        history.record(snap(0));
        history.undo(snap(1));
        assert!(history.can_redo());

        history.record(snap(0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks() {
        let mut history = History::new();
        assert!(history.undo(snap(0)).is_none());
        assert!(history.redo(snap(0)).is_none());
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::with_limit(3);
        for shade in 0..5 {
            history.record(snap(shade));
        }
        assert_eq!(history.undo_len(), 3);

        let mut current = snap(99);
        let mut seen = Vec::new();
        while let Some(prev) = history.undo(current.clone()) {
            seen.push(prev.clone());
            current = prev;
        }
        assert_eq!(seen, vec![snap(4), snap(3), snap(2)]);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(History::new().limit(), MAX_UNDO_HISTORY);
        assert_eq!(History::with_limit(0).limit(), 1);
    }
}
