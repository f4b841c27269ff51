//! Scene rendering: the layered CPU renderer, frame buffers, pointer handling, and export.

/// Frame buffers and per-pass counters.
pub mod backend;
pub(crate) mod composite;
/// Layered CPU renderer.
pub mod cpu;
/// Offscreen export to frames, PNG, and data URLs.
pub mod export;
/// Pointer events, hit testing, and the parallax camera.
pub mod pointer;
