use std::io::Cursor;
use std::time::Duration;

use base64::Engine as _;

use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{SceneError, SceneResult};
use crate::render::backend::{FrameRGBA, RenderReport};
use crate::render::cpu::SceneRenderer;
use crate::scene::model::ErrlScene;

/// Options for offscreen export.
#[derive(Clone, Debug)]
pub struct ImageExportOpts {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Skip the clear color and background even when the scene has one.
    pub transparent_bg: bool,
    /// How long to wait for pending asset loads before the final pass. Zero exports whatever is
    /// cached.
    pub asset_wait: Duration,
}

impl Default for ImageExportOpts {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            transparent_bg: false,
            asset_wait: Duration::from_secs(5),
        }
    }
}

impl SceneRenderer {
    /// Render `scene` at `playback_time_ms` to an offscreen frame.
    ///
    /// Works whether or not a surface is mounted; the mounted surface and its hit regions are
    /// left as they were. When the first pass leaves loads pending, waits up to
    /// [`ImageExportOpts::asset_wait`] and renders again.
    #[tracing::instrument(
        skip(self, scene, opts),
        fields(scene_id = %scene.id, w = opts.width, h = opts.height)
    )]
    pub fn render_frame(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
        opts: &ImageExportOpts,
    ) -> SceneResult<(FrameRGBA, RenderReport)> {
        let size = SurfaceSize::new(opts.width, opts.height)?;
        let (frame, report) =
            self.render_offscreen(scene, playback_time_ms, size, opts.transparent_bg)?;
        if report.is_complete() || opts.asset_wait.is_zero() {
            return Ok((frame, report));
        }

        if !self.assets_mut().wait_idle(opts.asset_wait) {
            tracing::warn!(
                pending = self.assets().pending_count(),
                "asset loads still pending at export"
            );
        }
        self.render_offscreen(scene, playback_time_ms, size, opts.transparent_bg)
    }

    /// Render `scene` offscreen and return it as a `data:image/png;base64,...` URL.
    pub fn render_to_image(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
        opts: &ImageExportOpts,
    ) -> SceneResult<String> {
        let (frame, _) = self.render_frame(scene, playback_time_ms, opts)?;
        let png = encode_png(&frame)?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

/// Encode a frame as PNG (straight alpha).
pub fn encode_png(frame: &FrameRGBA) -> SceneResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_straight_rgba())
        .ok_or_else(|| SceneError::render("frame buffer does not match its dimensions"))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| SceneError::render(format!("png encode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/render/export.rs"]
mod tests;
