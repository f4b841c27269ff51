use crate::foundation::error::{SceneError, SceneResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Pixel dimensions of a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceSize {
    /// Create a validated size. Both sides must be in `1..=u16::MAX` (the raster backend limit).
    pub fn new(width: u32, height: u32) -> SceneResult<Self> {
        if width == 0 || height == 0 {
            return Err(SceneError::validation("surface width/height must be > 0"));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(SceneError::validation(format!(
                "surface {width}x{height} exceeds {max}x{max}",
                max = u16::MAX
            )));
        }
        Ok(Self { width, height })
    }

    /// Width and height as the backend's `u16` pair.
    pub(crate) fn as_u16(self) -> SceneResult<(u16, u16)> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| SceneError::render("surface width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| SceneError::render("surface height exceeds u16"))?;
        Ok((w, h))
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Bytes in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Parse `#RRGGBB`, `#RRGGBBAA` or the short `#RGB` form into straight-alpha RGBA8.
pub fn parse_hex_rgba(s: &str) -> SceneResult<[u8; 4]> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> SceneResult<u8> {
        u8::from_str_radix(pair, 16)
            .map_err(|_| SceneError::validation(format!("invalid hex byte \"{pair}\"")))
    }

    if !s.is_ascii() {
        return Err(SceneError::validation("hex color must be ASCII"));
    }

    match s.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in s.chars().enumerate() {
                let v = hex_byte(&format!("{c}{c}"))?;
                out[i] = v;
            }
            Ok(out)
        }
        6 => Ok([
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            255,
        ]),
        8 => Ok([
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        ]),
        _ => Err(SceneError::validation(
            "hex color must be #RGB, #RRGGBB or #RRGGBBAA (case-insensitive)",
        )),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
