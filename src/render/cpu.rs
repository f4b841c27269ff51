use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::cache::{AssetCache, AssetLookup};
use crate::assets::decode::AssetImage;
use crate::assets::registry::AssetRegistry;
use crate::assets::source::AssetSource;
use crate::foundation::core::{
    Affine, Point, Rect, Rgba8Premul, SurfaceSize, Vec2, parse_hex_rgba,
};
use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::math::tint_rgba8_premul;
use crate::motion::evaluator::{MotionOffset, evaluate};
use crate::render::backend::{FrameRGBA, RenderReport};
use crate::render::composite::composite_over;
use crate::render::pointer::{HitRegion, PointerEvent, PointerOutcome, hit_test, parallax_camera};
use crate::scene::model::{BlendMode, ErrlScene, SceneEntity, SceneLayer, SceneViewport};

/// Options for [`SceneRenderer`].
#[derive(Clone, Debug)]
pub struct RendererOpts {
    /// Side of the square box asset content is normalised into; pivots are fractions of it.
    pub logical_unit: f64,
    /// Asset loader threads. `None` uses rayon's default.
    pub loader_threads: Option<usize>,
    /// Camera travel at the surface edge, in viewport pixels, before `zDepth` scaling.
    pub parallax_strength_px: f64,
    /// Straight RGBA8 of the loading placeholder.
    pub placeholder_rgba: [u8; 4],
    /// Straight RGBA8 of the missing-reference fallback.
    pub missing_rgba: [u8; 4],
    /// Straight RGBA8 the surface is cleared to when the background is not transparent.
    pub clear_rgba: [u8; 4],
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            logical_unit: 1024.0,
            loader_threads: None,
            parallax_strength_px: 24.0,
            placeholder_rgba: [136, 136, 136, 96],
            missing_rgba: [255, 0, 255, 255],
            clear_rgba: [0, 0, 0, 255],
        }
    }
}

struct Surface {
    size: SurfaceSize,
    frame: vello_cpu::Pixmap,
    scratch: vello_cpu::Pixmap,
}

impl Surface {
    fn new(size: SurfaceSize) -> SceneResult<Self> {
        let (w, h) = size.as_u16()?;
        Ok(Self {
            size,
            frame: vello_cpu::Pixmap::new(w, h),
            scratch: vello_cpu::Pixmap::new(w, h),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PaintKey {
    asset_id: String,
    tint: Option<[u8; 4]>,
}

struct CachedPaint {
    paint: vello_cpu::Image,
    last_pass: u64,
}

enum StepKind {
    Fill { rect: Rect, rgba: [u8; 4] },
    Image { paint: vello_cpu::Image, rect: Rect },
    Placeholder,
    Missing,
}

struct Step {
    kind: StepKind,
    transform: Affine,
    opacity: f32,
    blend: BlendMode,
}

impl Step {
    fn is_normal(&self) -> bool {
        self.blend.is_normal()
    }
}

/// Layered CPU renderer for [`ErrlScene`] values.
///
/// The renderer holds no playback time: every pass is a function of the scene, the time passed
/// to [`SceneRenderer::render`], the parallax camera, and whatever the asset cache has resolved so
/// far. Misses draw a placeholder and start a background load whose result shows up from the next
/// pass on.
pub struct SceneRenderer {
    opts: RendererOpts,
    cache: AssetCache,
    ctx: Option<vello_cpu::RenderContext>,
    surface: Option<Surface>,
    paints: HashMap<PaintKey, CachedPaint>,
    pass: u64,
    hit_regions: Vec<HitRegion>,
    parallax_enabled: bool,
    camera: Vec2,
}

impl SceneRenderer {
    /// Create an unmounted renderer resolving assets through `registry` and `source`.
    pub fn new(
        registry: Arc<dyn AssetRegistry>,
        source: Arc<dyn AssetSource>,
        opts: RendererOpts,
    ) -> SceneResult<Self> {
        if !opts.logical_unit.is_finite() || opts.logical_unit < 1.0 {
            return Err(SceneError::validation("logical_unit must be finite and >= 1"));
        }
        if !opts.parallax_strength_px.is_finite() {
            return Err(SceneError::validation("parallax_strength_px must be finite"));
        }
        let cache = AssetCache::new(registry, source, opts.logical_unit, opts.loader_threads)?;
        Ok(Self {
            opts,
            cache,
            ctx: None,
            surface: None,
            paints: HashMap::new(),
            pass: 0,
            hit_regions: Vec::new(),
            parallax_enabled: true,
            camera: Vec2::ZERO,
        })
    }

    /// Attach an output surface of `size`. Mounting again resizes it.
    pub fn mount(&mut self, size: SurfaceSize) -> SceneResult<()> {
        self.surface = Some(Surface::new(size)?);
        self.hit_regions.clear();
        Ok(())
    }

    /// Detach the surface and drop cached content. Loads still in flight are discarded on arrival.
    pub fn unmount(&mut self) {
        self.surface = None;
        self.cache.clear();
        self.paints.clear();
        self.hit_regions.clear();
        self.camera = Vec2::ZERO;
    }

    /// Whether a surface is attached.
    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    /// Size of the attached surface.
    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.surface.as_ref().map(|s| s.size)
    }

    /// Options this renderer was built with.
    pub fn opts(&self) -> &RendererOpts {
        &self.opts
    }

    /// Asset cache (fetch counters, pending loads).
    pub fn assets(&self) -> &AssetCache {
        &self.cache
    }

    /// Mutable asset cache, e.g. to [`AssetCache::retry`] a failed load or wait for loads.
    pub fn assets_mut(&mut self) -> &mut AssetCache {
        &mut self.cache
    }

    /// Enable or disable pointer-driven parallax. Disabling recentres the camera.
    pub fn set_parallax_enabled(&mut self, enabled: bool) {
        self.parallax_enabled = enabled;
        if !enabled {
            self.camera = Vec2::ZERO;
        }
    }

    /// Whether parallax is enabled.
    pub fn parallax_enabled(&self) -> bool {
        self.parallax_enabled
    }

    /// Current parallax camera offset in viewport pixels.
    pub fn camera(&self) -> Vec2 {
        self.camera
    }

    /// Render `scene` at `playback_time_ms` into the mounted surface.
    #[tracing::instrument(skip(self, scene), fields(scene_id = %scene.id))]
    pub fn render(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
    ) -> SceneResult<RenderReport> {
        self.render_pass(scene, playback_time_ms, false)
    }

    /// Copy of the last rendered frame.
    pub fn snapshot(&self) -> SceneResult<FrameRGBA> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| SceneError::render("renderer is not mounted"))?;
        Ok(FrameRGBA {
            width: surface.size.width,
            height: surface.size.height,
            data: surface.frame.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    /// React to pointer input. `Down` hit-tests the last rendered frame.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) -> PointerOutcome {
        match event {
            PointerEvent::Move { x, y } => {
                let Some(size) = self.surface_size() else {
                    return PointerOutcome::None;
                };
                if !self.parallax_enabled {
                    return PointerOutcome::None;
                }
                let camera = parallax_camera(
                    x,
                    y,
                    f64::from(size.width),
                    f64::from(size.height),
                    self.opts.parallax_strength_px,
                );
                if camera == self.camera {
                    return PointerOutcome::None;
                }
                self.camera = camera;
                PointerOutcome::ParallaxChanged
            }
            PointerEvent::Leave => {
                if self.camera == Vec2::ZERO {
                    return PointerOutcome::None;
                }
                self.camera = Vec2::ZERO;
                PointerOutcome::ParallaxChanged
            }
            PointerEvent::Down { x, y } => match hit_test(&self.hit_regions, Point::new(x, y)) {
                Some(id) => PointerOutcome::Hit(id.to_string()),
                None => PointerOutcome::Miss,
            },
        }
    }

    /// Render into a temporary surface of `size`, leaving the mounted surface untouched.
    pub(crate) fn render_offscreen(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
        size: SurfaceSize,
        force_transparent: bool,
    ) -> SceneResult<(FrameRGBA, RenderReport)> {
        let offscreen = Surface::new(size)?;
        let saved_surface = self.surface.replace(offscreen);
        let saved_hits = std::mem::take(&mut self.hit_regions);

        let result = self
            .render_pass(scene, playback_time_ms, force_transparent)
            .and_then(|report| Ok((self.snapshot()?, report)));

        self.surface = saved_surface;
        self.hit_regions = saved_hits;
        result
    }

    fn render_pass(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
        force_transparent: bool,
    ) -> SceneResult<RenderReport> {
        if !playback_time_ms.is_finite() {
            return Err(SceneError::validation("playback time must be finite"));
        }
        self.cache.drain();

        let mut surface = self
            .surface
            .take()
            .ok_or_else(|| SceneError::render("renderer is not mounted"))?;
        let result = self.draw_scene(scene, playback_time_ms, force_transparent, &mut surface);
        self.surface = Some(surface);
        result
    }

    fn draw_scene(
        &mut self,
        scene: &ErrlScene,
        playback_time_ms: f64,
        force_transparent: bool,
        surface: &mut Surface,
    ) -> SceneResult<RenderReport> {
        let transparent = force_transparent || scene.background.is_transparent();
        let view = view_transform(&scene.viewport, surface.size);
        let mut report = RenderReport::default();
        let mut hits = Vec::new();
        let mut steps = Vec::new();
        self.pass += 1;

        if !transparent {
            self.background_steps(scene, view, &mut steps, &mut report);
        }
        self.entity_steps(
            scene,
            playback_time_ms / 1000.0,
            view,
            &mut steps,
            &mut hits,
            &mut report,
        );
        report.pending_assets = self.cache.pending_count();
        // Paints (tints included) not referenced by this pass are dropped.
        let pass = self.pass;
        self.paints.retain(|_, p| p.last_pass == pass);

        if transparent {
            surface.frame.data_as_u8_slice_mut().fill(0);
        } else {
            let [r, g, b, a] = self.opts.clear_rgba;
            clear_pixmap(
                &mut surface.frame,
                Rgba8Premul::from_straight_rgba(r, g, b, a).to_array(),
            );
        }

        let (w, h) = surface.size.as_u16()?;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };

        let mut i = 0;
        while i < steps.len() {
            let end = if steps[i].is_normal() {
                steps[i..]
                    .iter()
                    .position(|s| !s.is_normal())
                    .map_or(steps.len(), |n| i + n)
            } else {
                i + 1
            };
            let batch = &steps[i..end];
            let (opacity, blend, inline_opacity) = if batch[0].is_normal() {
                (1.0, BlendMode::Normal, true)
            } else {
                (batch[0].opacity, batch[0].blend.clone(), false)
            };

            rasterize(&mut ctx, batch, inline_opacity, &self.opts, &mut surface.scratch);
            composite_over(
                surface.frame.data_as_u8_slice_mut(),
                surface.scratch.data_as_u8_slice(),
                opacity,
                &blend,
            )?;
            i = end;
        }

        self.ctx = Some(ctx);
        self.hit_regions = hits;
        Ok(report)
    }

    fn background_steps(
        &mut self,
        scene: &ErrlScene,
        view: Affine,
        steps: &mut Vec<Step>,
        report: &mut RenderReport,
    ) {
        let vp = &scene.viewport;
        let viewport_rect = Rect::new(0.0, 0.0, vp.width, vp.height);

        if let Some(hex) = scene
            .background
            .params
            .as_ref()
            .and_then(|p| p.color_hex.as_deref())
        {
            match parse_hex_rgba(hex) {
                Ok(rgba) => steps.push(Step {
                    kind: StepKind::Fill {
                        rect: viewport_rect,
                        rgba,
                    },
                    transform: view,
                    opacity: 1.0,
                    blend: BlendMode::Normal,
                }),
                Err(err) => tracing::warn!(color = hex, error = %err, "ignoring background color"),
            }
        }

        for plane_id in scene.background.planes.in_paint_order() {
            let AssetLookup::Ready(img) = self.cache.lookup(plane_id) else {
                continue;
            };
            let paint = match self.paint_for(plane_id, &img, None) {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(asset_id = plane_id, error = %err, "plane paint failed");
                    continue;
                }
            };
            let (fit, rect) = cover_fit(&img, vp);
            steps.push(Step {
                kind: StepKind::Image { paint, rect },
                transform: view * fit,
                opacity: 1.0,
                blend: BlendMode::Normal,
            });
            report.planes_drawn += 1;
        }
    }

    fn entity_steps(
        &mut self,
        scene: &ErrlScene,
        t_secs: f64,
        view: Affine,
        steps: &mut Vec<Step>,
        hits: &mut Vec<HitRegion>,
        report: &mut RenderReport,
    ) {
        let unit = self.opts.logical_unit;
        let layers: HashMap<&str, &SceneLayer> =
            scene.layers.iter().map(|l| (l.id.as_str(), l)).collect();

        let mut ordered: Vec<(&SceneLayer, usize, &SceneEntity)> = scene
            .entities
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                let layer = layers.get(e.layer_id.as_str())?;
                layer.visible.then_some((*layer, i, e))
            })
            .collect();
        ordered.sort_by_key(|(layer, i, e)| (layer.z_index, e.order, *i));

        for (layer, _, entity) in ordered {
            let opacity = entity.style.opacity.clamp(0.0, 1.0) as f32;
            if opacity.is_nan() || opacity <= 0.0 {
                continue;
            }
            let offset = evaluate(&entity.motion, t_secs);
            let parallax = self.camera * layer.z_depth;
            let transform = view * entity_transform(entity, &offset, parallax, unit);
            let unit_box = Rect::new(0.0, 0.0, unit, unit);

            let (kind, draw_transform, bounds) = match self.cache.lookup(&entity.asset_id) {
                AssetLookup::Ready(img) => {
                    let tint = entity.style.tint_hex.as_deref().and_then(|hex| {
                        parse_hex_rgba(hex)
                            .inspect_err(|err| {
                                tracing::debug!(entity_id = %entity.id, error = %err, "bad tint")
                            })
                            .ok()
                    });
                    match self.paint_for(&entity.asset_id, &img, tint) {
                        Ok(paint) => {
                            report.cached += 1;
                            let (ox, oy) = img.offset_in_unit(unit);
                            let w = f64::from(img.width);
                            let h = f64::from(img.height);
                            (
                                StepKind::Image {
                                    paint,
                                    rect: Rect::new(0.0, 0.0, w, h),
                                },
                                transform * Affine::translate((ox, oy)),
                                Rect::new(ox, oy, ox + w, oy + h),
                            )
                        }
                        Err(err) => {
                            let asset_id = entity.asset_id.as_str();
                            tracing::warn!(asset_id, error = %err, "asset paint failed");
                            report.placeholders += 1;
                            (StepKind::Placeholder, transform, unit_box)
                        }
                    }
                }
                AssetLookup::Pending | AssetLookup::Failed => {
                    report.placeholders += 1;
                    (StepKind::Placeholder, transform, unit_box)
                }
                AssetLookup::Missing => {
                    report.missing += 1;
                    (StepKind::Missing, transform, unit_box)
                }
            };

            report.entities_drawn += 1;
            hits.push(HitRegion::new(&entity.id, layer.locked, transform, bounds));

            steps.push(Step {
                kind,
                transform: draw_transform,
                opacity,
                blend: entity.style.blend_mode.clone().unwrap_or_default(),
            });
        }
    }

    fn paint_for(
        &mut self,
        asset_id: &str,
        img: &AssetImage,
        tint: Option<[u8; 4]>,
    ) -> SceneResult<vello_cpu::Image> {
        let key = PaintKey {
            asset_id: asset_id.to_string(),
            tint,
        };
        if let Some(cached) = self.paints.get_mut(&key) {
            cached.last_pass = self.pass;
            return Ok(cached.paint.clone());
        }
        let pixmap = match tint {
            Some(t) => {
                let tinted = tint_rgba8_premul(&img.rgba8_premul, t);
                pixmap_from_premul_bytes(&tinted, img.width, img.height)?
            }
            None => pixmap_from_premul_bytes(&img.rgba8_premul, img.width, img.height)?,
        };
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.paints.insert(
            key,
            CachedPaint {
                paint: paint.clone(),
                last_pass: self.pass,
            },
        );
        Ok(paint)
    }
}

/// Entity placement in viewport space with the pivot anchored inside the `unit` box:
///
/// `translate(x + dx, y + dy) * rotate(rotation + d_rot)`
/// `* scale(sx * ds, sy * ds) * translate(-pivot)`
pub fn entity_transform(
    entity: &SceneEntity,
    offset: &MotionOffset,
    parallax: Vec2,
    unit: f64,
) -> Affine {
    let t = &entity.transform;
    let pivot = Vec2::new(
        unit * t.pivot_x.unwrap_or(0.5),
        unit * t.pivot_y.unwrap_or(0.5),
    );
    Affine::translate((t.x + offset.dx + parallax.x, t.y + offset.dy + parallax.y))
        * Affine::rotate((t.rotation + offset.d_rot).to_radians())
        * Affine::scale_non_uniform(t.scale_x * offset.d_scale, t.scale_y * offset.d_scale)
        * Affine::translate(-pivot)
}

/// Uniformly fit the viewport into the surface, centred.
pub fn view_transform(viewport: &SceneViewport, size: SurfaceSize) -> Affine {
    let (sw, sh) = (f64::from(size.width), f64::from(size.height));
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return Affine::IDENTITY;
    }
    let s = (sw / viewport.width).min(sh / viewport.height);
    let ox = (sw - viewport.width * s) / 2.0;
    let oy = (sh - viewport.height * s) / 2.0;
    Affine::translate((ox, oy)) * Affine::scale(s)
}

fn cover_fit(img: &AssetImage, vp: &SceneViewport) -> (Affine, Rect) {
    let (w, h) = (f64::from(img.width), f64::from(img.height));
    let s = (vp.width / w).max(vp.height / h);
    let tx = (vp.width - w * s) / 2.0;
    let ty = (vp.height - h * s) / 2.0;
    let visible = Rect::new(-tx / s, -ty / s, (vp.width - tx) / s, (vp.height - ty) / s);
    let rect = visible.intersect(Rect::new(0.0, 0.0, w, h));
    (Affine::translate((tx, ty)) * Affine::scale(s), rect)
}

fn rasterize(
    ctx: &mut vello_cpu::RenderContext,
    steps: &[Step],
    inline_opacity: bool,
    opts: &RendererOpts,
    dst: &mut vello_cpu::Pixmap,
) {
    ctx.reset();
    for step in steps {
        let layered = inline_opacity && step.opacity < 1.0;
        if layered {
            ctx.push_opacity_layer(step.opacity);
        }
        draw_step(ctx, step, opts);
        if layered {
            ctx.pop_layer();
        }
    }
    ctx.flush();
    dst.data_as_u8_slice_mut().fill(0);
    ctx.render_to_pixmap(dst);
}

fn draw_step(ctx: &mut vello_cpu::RenderContext, step: &Step, opts: &RendererOpts) {
    ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(affine_to_cpu(step.transform));

    let unit = opts.logical_unit;
    match &step.kind {
        StepKind::Fill { rect, rgba } => {
            ctx.set_paint(color(*rgba));
            ctx.fill_rect(&rect_to_cpu(*rect));
        }
        StepKind::Image { paint, rect } => {
            ctx.set_paint(paint.clone());
            ctx.fill_rect(&rect_to_cpu(*rect));
        }
        StepKind::Placeholder => {
            ctx.set_paint(color(opts.placeholder_rgba));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, unit, unit));
        }
        StepKind::Missing => draw_missing_marker(ctx, unit, opts.missing_rgba),
    }
}

/// Tinted box with a solid frame and a diagonal cross.
fn draw_missing_marker(ctx: &mut vello_cpu::RenderContext, unit: f64, rgba: [u8; 4]) {
    let [r, g, b, a] = rgba;
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a / 4));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, unit, unit));

    ctx.set_paint(color(rgba));
    let t = (unit / 24.0).max(1.0);
    for edge in [
        vello_cpu::kurbo::Rect::new(0.0, 0.0, unit, t),
        vello_cpu::kurbo::Rect::new(0.0, unit - t, unit, unit),
        vello_cpu::kurbo::Rect::new(0.0, t, t, unit - t),
        vello_cpu::kurbo::Rect::new(unit - t, t, unit, unit - t),
    ] {
        ctx.fill_rect(&edge);
    }

    for band in [
        [(t, 0.0), (unit, unit - t), (unit - t, unit), (0.0, t)],
        [(unit - t, 0.0), (unit, t), (t, unit), (0.0, unit - t)],
    ] {
        let mut p = vello_cpu::kurbo::BezPath::new();
        p.move_to(band[0]);
        for pt in &band[1..] {
            p.line_to(*pt);
        }
        p.close_path();
        ctx.fill_path(&p);
    }
}

fn color(rgba: [u8; 4]) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = rgba;
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, premul: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&premul);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> SceneResult<vello_cpu::Pixmap> {
    use vello_cpu::peniko::color::PremulRgba8;

    let size = SurfaceSize::new(width, height)?;
    let (w, h) = size.as_u16()?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(SceneError::render("pixmap byte len mismatch"));
    }
    let pixels: Vec<PremulRgba8> = bytes
        .chunks_exact(4)
        .map(|px| PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
