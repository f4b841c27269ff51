//! Errl scene engine: the document model, editing store, procedural motion, and renderer behind
//! the Errl scene builder.
//!
//! The public API is organised around three pieces:
//!
//! - An [`ErrlScene`] document, loaded and saved as JSON via [`import_scene`] / [`export_scene`]
//! - A [`SceneStore`] that applies edits with undo/redo and notifies subscribers
//! - A [`SceneRenderer`] that draws a scene at a playback time into a mounted surface or an
//!   offscreen export, loading assets in the background
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Asset registry, sources, decoding, and the render-side cache.
pub mod assets;
/// Bounded undo/redo history.
pub mod history;
/// Procedural motion presets.
pub mod motion;
/// Layered CPU renderer and export.
pub mod render;
/// Scene document model and JSON boundary.
pub mod scene;
/// Scene Store.
pub mod store;

pub use crate::foundation::core::{
    Affine, Point, Rect, Rgba8Premul, SurfaceSize, Vec2, parse_hex_rgba,
};
pub use crate::foundation::error::{SceneError, SceneResult};

pub use crate::assets::cache::{AssetCache, AssetLookup};
pub use crate::assets::decode::AssetImage;
pub use crate::assets::registry::{AssetRecord, AssetRegistry, StaticAssetRegistry};
pub use crate::assets::source::{AssetSource, FsAssetSource};
pub use crate::history::manager::{DEFAULT_HISTORY_CAPACITY, HistoryManager};
pub use crate::motion::evaluator::{MotionOffset, evaluate};
pub use crate::render::backend::{FrameRGBA, RenderReport};
pub use crate::render::cpu::{RendererOpts, SceneRenderer, entity_transform, view_transform};
pub use crate::render::export::{ImageExportOpts, encode_png};
pub use crate::render::pointer::{PointerEvent, PointerOutcome};
pub use crate::scene::io::{
    export_scene, import_scene, import_scene_validated, load_scene, save_scene,
};
pub use crate::scene::model::{
    BlendMode, ErrlScene, EntityStyle, EntityTransform, MotionId, MotionInstance, MotionParams,
    SCENE_VERSION, SceneBackground, SceneEntity, SceneLayer, SceneViewport, create_base_scene,
};
pub use crate::store::scene_store::{
    ChangeKind, ListenerId, ReorderDirection, SceneMeta, SceneStore, StoreChange, StoreOpts,
};
