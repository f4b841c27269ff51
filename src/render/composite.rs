use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::math::mul_div255_u8;
use crate::scene::model::BlendMode;

/// Composite premultiplied `src` over `dst` in place with the given opacity and blend mode.
///
/// `Other` modes composite as `Normal`.
pub(crate) fn composite_over(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    blend: &BlendMode,
) -> SceneResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(SceneError::render(
            "composite_over expects equal-length rgba8 buffers",
        ));
    }

    // One dispatch per call; each arm gets its own specialised kernel.
    match blend {
        BlendMode::Normal | BlendMode::Other(_) => premul_over(dst, src, opacity),
        BlendMode::Multiply => blend_over(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => blend_over(dst, src, opacity, |s, d| s + d - s * d),
        BlendMode::Overlay => blend_over(dst, src, opacity, |s, d| {
            if d <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }),
        BlendMode::Darken => blend_over(dst, src, opacity, |s, d| s.min(d)),
        BlendMode::Lighten => blend_over(dst, src, opacity, |s, d| s.max(d)),
        BlendMode::Add => plus(dst, src, opacity),
    }
    Ok(())
}

fn opacity_u16(opacity: f32) -> u16 {
    ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16
}

fn premul_over(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = opacity_u16(opacity);
    if op == 0 {
        return;
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);
        d[3] = sa.saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = sc.saturating_add(dc);
        }
    }
}

fn plus(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = opacity_u16(opacity);
    if op == 0 {
        return;
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        for c in 0..4 {
            d[c] = d[c].saturating_add(mul_div255_u8(u16::from(s[c]), op));
        }
    }
}

#[inline(always)]
fn blend_over<F>(dst: &mut [u8], src: &[u8], opacity: f32, blend_fn: F)
where
    F: Fn(f32, f32) -> f32,
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        // Source-over with the blend applied to straight colour:
        // out_a = sa + da * (1 - sa)
        // out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
        let sa = (f32::from(s[3]) / 255.0) * opacity;
        if sa <= 0.0 {
            continue;
        }
        let da = f32::from(d[3]) / 255.0;
        let inv_sa = 1.0 - sa;
        let inv_da = 1.0 - da;

        for c in 0..3 {
            let sp = (f32::from(s[c]) / 255.0) * opacity;
            let dp = f32::from(d[c]) / 255.0;
            let sc = (sp / sa).clamp(0.0, 1.0);
            let dc = if da > 0.0 {
                (dp / da).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let out = sp * inv_da + dp * inv_sa + blend_fn(sc, dc) * sa * da;
            d[c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        let out_a = (sa + da * inv_sa).clamp(0.0, 1.0);
        d[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
