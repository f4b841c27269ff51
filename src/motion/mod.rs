//! Time-driven procedural motion.

/// Pure evaluator folding motion instances into a transform offset.
pub mod evaluator;
