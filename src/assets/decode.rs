use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::math::premultiply_rgba8_in_place;

const MAX_DIM: u32 = 16_384;

#[derive(Clone, Debug)]
/// Render-ready asset content in premultiplied RGBA8, fitted into the logical unit box.
pub struct AssetImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl AssetImage {
    /// Offset that centres this image inside a `unit` x `unit` box.
    pub fn offset_in_unit(&self, unit: f64) -> (f64, f64) {
        (
            (unit - f64::from(self.width)) / 2.0,
            (unit - f64::from(self.height)) / 2.0,
        )
    }
}

/// Decode raster or SVG bytes and normalise them so the longest side equals `unit`.
///
/// SVG is detected by the `.svg` extension or by sniffing the leading markup.
pub fn decode_asset(file_path: &str, bytes: &[u8], unit: f64) -> SceneResult<AssetImage> {
    if !unit.is_finite() || unit < 1.0 || unit > f64::from(MAX_DIM) {
        return Err(SceneError::validation(format!(
            "logical unit must be in [1, {MAX_DIM}], got {unit}"
        )));
    }
    if is_svg(file_path, bytes) {
        decode_svg(bytes, unit)
    } else {
        decode_raster(bytes, unit)
    }
}

fn is_svg(file_path: &str, bytes: &[u8]) -> bool {
    if file_path.to_ascii_lowercase().ends_with(".svg") {
        return true;
    }
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Fit `(w, h)` into a `unit` square keeping aspect ratio; the longest side becomes `unit`.
pub fn fit_to_unit(w: f64, h: f64, unit: f64) -> SceneResult<(u32, u32)> {
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(SceneError::asset("asset has invalid width/height"));
    }
    let s = unit / w.max(h);
    let fw = ((w * s).round() as u32).clamp(1, MAX_DIM);
    let fh = ((h * s).round() as u32).clamp(1, MAX_DIM);
    Ok((fw, fh))
}

fn decode_raster(bytes: &[u8], unit: f64) -> SceneResult<AssetImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let (fw, fh) = fit_to_unit(f64::from(w), f64::from(h), unit)?;

    let rgba = if (fw, fh) == (w, h) {
        rgba
    } else {
        image::imageops::resize(&rgba, fw, fh, image::imageops::FilterType::Triangle)
    };

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Ok(AssetImage {
        width: fw,
        height: fh,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn decode_svg(bytes: &[u8], unit: f64) -> SceneResult<AssetImage> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    let size = tree.size();
    let (fw, fh) = fit_to_unit(f64::from(size.width()), f64::from(size.height()), unit)?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(fw, fh)
        .ok_or_else(|| SceneError::asset("failed to allocate svg pixmap"))?;
    let sx = (fw as f32) / size.width();
    let sy = (fh as f32) / size.height();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );

    Ok(AssetImage {
        width: fw,
        height: fh,
        rgba8_premul: Arc::new(pixmap.take()),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
