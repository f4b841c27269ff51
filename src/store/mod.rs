//! Scene Store: the mutation API over a scene document.

/// Store implementation, options, and change notifications.
pub mod scene_store;
