//! Asset resolution: registry lookups, byte sources, decoding, and the render-side cache.

/// Asynchronous, de-duplicated asset cache.
pub mod cache;
/// Raster/SVG decoding into premultiplied RGBA8.
pub mod decode;
/// Asset registry trait and a manifest-backed implementation.
pub mod registry;
/// Byte sources asset content is fetched from.
pub mod source;
