use std::collections::VecDeque;

/// Default number of snapshots kept on each of the undo and redo stacks.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded linear undo/redo history over immutable snapshots.
///
/// `past` and `future` are each capped at `capacity`; pushing past the cap drops the oldest entry.
#[derive(Clone, Debug)]
pub struct HistoryManager<T> {
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> HistoryManager<T> {
    /// New history whose present is `initial`. A zero capacity is treated as 1.
    pub fn new(initial: T, capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: initial,
            future: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Current snapshot.
    pub fn present(&self) -> &T {
        &self.present
    }

    /// Maximum depth of each stack.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make `next` the present, recording the old present for undo. Clears redo.
    pub fn push_state(&mut self, next: T) {
        let prev = std::mem::replace(&mut self.present, next);
        push_bounded(&mut self.past, prev, self.capacity);
        self.future.clear();
    }

    /// Step back one snapshot. Returns `None` (and changes nothing) when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&T> {
        let prev = self.past.pop_back()?;
        let cur = std::mem::replace(&mut self.present, prev);
        push_bounded(&mut self.future, cur, self.capacity);
        Some(&self.present)
    }

    /// Step forward one snapshot. Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&T> {
        let next = self.future.pop_back()?;
        let cur = std::mem::replace(&mut self.present, next);
        push_bounded(&mut self.past, cur, self.capacity);
        Some(&self.present)
    }

    /// `true` when [`HistoryManager::undo`] would change the present.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// `true` when [`HistoryManager::redo`] would change the present.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of snapshots available to undo.
    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    /// Number of snapshots available to redo.
    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    /// Replace the present and forget all history.
    pub fn reset(&mut self, present: T) {
        self.present = present;
        self.past.clear();
        self.future.clear();
    }
}

fn push_bounded<T>(stack: &mut VecDeque<T>, value: T, capacity: usize) {
    if stack.len() == capacity {
        stack.pop_front();
    }
    stack.push_back(value);
}

#[cfg(test)]
#[path = "../../tests/unit/history/manager.rs"]
mod tests;
