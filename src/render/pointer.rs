use crate::foundation::core::{Affine, Point, Rect, Vec2};

/// Pointer input in surface pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    /// Pointer moved over the surface.
    Move {
        /// X in surface pixels.
        x: f64,
        /// Y in surface pixels.
        y: f64,
    },
    /// Primary button pressed.
    Down {
        /// X in surface pixels.
        x: f64,
        /// Y in surface pixels.
        y: f64,
    },
    /// Pointer left the surface.
    Leave,
}

/// What the renderer made of a [`PointerEvent`].
///
/// Selection itself is the host's job: forward a `Hit` to the Scene Store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Nothing to report.
    None,
    /// The parallax camera moved; the next render will differ.
    ParallaxChanged,
    /// The topmost unlocked entity under the pointer.
    Hit(String),
    /// The press landed on no entity.
    Miss,
}

/// Screen-space footprint of one drawn entity from the last render pass.
#[derive(Clone, Debug)]
pub(crate) struct HitRegion {
    pub(crate) entity_id: String,
    pub(crate) locked: bool,
    /// Surface pixels to entity-local coordinates.
    pub(crate) inverse: Affine,
    /// Drawn content bounds in entity-local coordinates.
    pub(crate) local_bounds: Rect,
}

impl HitRegion {
    pub(crate) fn new(
        entity_id: &str,
        locked: bool,
        transform: Affine,
        local_bounds: Rect,
    ) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            locked,
            inverse: transform.inverse(),
            local_bounds,
        }
    }

    fn contains(&self, p: Point) -> bool {
        let local = self.inverse * p;
        local.x.is_finite() && local.y.is_finite() && self.local_bounds.contains(local)
    }
}

/// Topmost unlocked region containing `p`. Regions are stored in paint order.
pub(crate) fn hit_test(regions: &[HitRegion], p: Point) -> Option<&str> {
    regions
        .iter()
        .rev()
        .filter(|r| !r.locked)
        .find(|r| r.contains(p))
        .map(|r| r.entity_id.as_str())
}

/// Camera offset for a pointer at `(x, y)` on a `width` x `height` surface.
///
/// The centre maps to zero and the edges to `±strength` viewport pixels.
pub(crate) fn parallax_camera(x: f64, y: f64, width: f64, height: f64, strength: f64) -> Vec2 {
    if width <= 0.0 || height <= 0.0 {
        return Vec2::ZERO;
    }
    let nx = ((x / width) - 0.5).clamp(-0.5, 0.5) * 2.0;
    let ny = ((y / height) - 0.5).clamp(-0.5, 0.5) * 2.0;
    Vec2::new(nx * strength, ny * strength)
}

#[cfg(test)]
#[path = "../../tests/unit/render/pointer.rs"]
mod tests;
