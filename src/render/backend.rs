use crate::foundation::math::{Fnv1a64, unpremultiply_rgba8_in_place};

/// A rendered frame as RGBA8 pixels.
///
/// Frames produced by the renderer are premultiplied alpha. The `premultiplied` flag makes this
/// explicit at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Stable 64-bit hash of the dimensions and pixel bytes.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        h.write_u64(u64::from(self.width));
        h.write_u64(u64::from(self.height));
        h.write_bytes(&self.data);
        h.finish()
    }

    /// Copy of the pixels with straight (non-premultiplied) alpha, as image encoders expect.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut out);
        }
        out
    }
}

/// Per-pass counters returned by [`crate::SceneRenderer::render`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Entities on visible layers that were drawn in any form.
    pub entities_drawn: usize,
    /// Entities drawn from decoded, cached content.
    pub cached: usize,
    /// Entities drawn as a loading (or failed) placeholder.
    pub placeholders: usize,
    /// Entities whose asset id is unknown to the registry.
    pub missing: usize,
    /// Background planes drawn from cached content.
    pub planes_drawn: usize,
    /// Asset loads still in flight after this pass.
    pub pending_assets: usize,
}

impl RenderReport {
    /// `true` when nothing in the frame is waiting on an asset load.
    pub fn is_complete(&self) -> bool {
        self.pending_assets == 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/backend.rs"]
mod tests;
