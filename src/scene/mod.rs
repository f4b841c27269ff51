//! Scene documents: the authored data model and its JSON boundary.

/// JSON import/export and file helpers.
pub mod io;
/// Scene, layer, entity and motion types.
pub mod model;
