//! Undo/redo history.

/// Bounded snapshot history.
pub mod manager;
