use std::collections::{BTreeMap, HashMap, HashSet};

use crate::foundation::error::{SceneError, SceneResult};

/// Current document schema version written by [`create_base_scene`].
pub const SCENE_VERSION: u32 = 1;

/// Free-form parameter bag carried by motions, effects, weather and backgrounds.
pub type ParamBag = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// A complete authored scene document.
///
/// A scene is a pure value: it carries no runtime or animation state. Everything visible at a
/// given playback time is derived from `(entity.transform, entity.motion, time)` by the renderer.
pub struct ErrlScene {
    /// Document schema version.
    pub version: u32,
    /// Stable scene identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last modification timestamp (RFC 3339).
    pub updated_at: String,
    /// Logical canvas the scene is authored against.
    pub viewport: SceneViewport,
    /// Background planes and mood.
    pub background: SceneBackground,
    /// Scene-level effects.
    #[serde(default)]
    pub fx: SceneFx,
    /// Scene-level weather layers.
    #[serde(default)]
    pub weather: Vec<SceneWeatherConfig>,
    /// Layers; paint order is ascending `z_index`.
    pub layers: Vec<SceneLayer>,
    /// Entities; every `layer_id` references an entry of `layers`.
    pub entities: Vec<SceneEntity>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Logical authoring canvas.
pub struct SceneViewport {
    /// Width in logical pixels.
    pub width: f64,
    /// Height in logical pixels.
    pub height: f64,
    /// Aspect ratio (`width / height`).
    pub aspect_ratio: f64,
    /// Optional title-safe margin in logical pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_margin: Option<f64>,
}

impl Default for SceneViewport {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            aspect_ratio: 16.0 / 9.0,
            safe_margin: Some(48.0),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Background description: a preset scene/mood plus up to three image planes.
pub struct SceneBackground {
    /// Background preset identifier.
    pub scene_id: String,
    /// Mood preset identifier.
    pub mood_id: String,
    /// Back/middle/front planes drawn before entities.
    #[serde(default)]
    pub planes: BackgroundPlanes,
    /// Optional rendering parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BackgroundParams>,
}

impl SceneBackground {
    /// `true` when the scene asks for no background at all.
    pub fn is_transparent(&self) -> bool {
        self.params.as_ref().is_some_and(|p| p.transparent)
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Asset references for the three background planes. Any may be absent.
pub struct BackgroundPlanes {
    /// Back plane asset id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_asset_id: Option<String>,
    /// Middle plane asset id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mg_asset_id: Option<String>,
    /// Front plane asset id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_asset_id: Option<String>,
}

impl BackgroundPlanes {
    /// Present plane ids in paint order (bg, mg, fg).
    pub fn in_paint_order(&self) -> impl Iterator<Item = &str> {
        [&self.bg_asset_id, &self.mg_asset_id, &self.fg_asset_id]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Background rendering parameters.
pub struct BackgroundParams {
    /// Flat colour painted beneath the planes (`#RRGGBB[AA]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    /// Skip background colour and planes entirely.
    #[serde(default)]
    pub transparent: bool,
    /// Unrecognised keys, preserved on round-trip.
    #[serde(flatten)]
    pub extra: ParamBag,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Scene-level effect stack.
pub struct SceneFx {
    /// Effects applied to the whole composition.
    #[serde(default)]
    pub global_fx: Vec<FxInstance>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Named effect with a parameter bag.
pub struct FxInstance {
    /// Instance identifier.
    pub id: String,
    /// Effect type identifier.
    pub fx_id: String,
    /// Whether the effect is active.
    pub enabled: bool,
    /// Effect parameters.
    #[serde(default)]
    pub params: ParamBag,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Named weather layer with a parameter bag.
pub struct SceneWeatherConfig {
    /// Instance identifier.
    pub id: String,
    /// Weather type identifier.
    pub weather_id: String,
    /// Whether the weather layer is active.
    pub enabled: bool,
    /// Weather parameters.
    #[serde(default)]
    pub params: ParamBag,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Named, orderable grouping of entities.
pub struct SceneLayer {
    /// Layer identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Paint order; ascending. Need not be contiguous.
    pub z_index: i32,
    /// Parallax depth, independent of paint order.
    pub z_depth: f64,
    /// Hidden layers are not drawn.
    pub visible: bool,
    /// Locked layers ignore pointer hits.
    pub locked: bool,
    /// Marks the layer that hosts background plane content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_background_plane: Option<bool>,
}

impl SceneLayer {
    /// Build a visible, unlocked layer.
    pub fn new(id: impl Into<String>, name: impl Into<String>, z_index: i32, z_depth: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            z_index,
            z_depth,
            visible: true,
            locked: false,
            is_background_plane: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// A positioned, animatable reference to a visual asset.
pub struct SceneEntity {
    /// Entity identifier.
    pub id: String,
    /// Key into the external asset registry.
    pub asset_id: String,
    /// Owning layer.
    pub layer_id: String,
    /// Rank within the owning layer (dense, 0-based); ties fall back to array order.
    #[serde(default)]
    pub order: u32,
    /// Base placement.
    pub transform: EntityTransform,
    /// Appearance.
    #[serde(default)]
    pub style: EntityStyle,
    /// Procedural motions, applied in list order.
    #[serde(default)]
    pub motion: Vec<MotionInstance>,
    /// Optional behaviour tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_tags: Option<Vec<String>>,
    /// Arbitrary user metadata.
    #[serde(default)]
    pub metadata: ParamBag,
}

impl SceneEntity {
    /// Build an entity with a fresh id, identity style and no motion.
    pub fn new(
        asset_id: impl Into<String>,
        layer_id: impl Into<String>,
        transform: EntityTransform,
    ) -> Self {
        Self {
            id: new_id("entity"),
            asset_id: asset_id.into(),
            layer_id: layer_id.into(),
            order: 0,
            transform,
            style: EntityStyle::default(),
            motion: Vec::new(),
            behavior_tags: None,
            metadata: ParamBag::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Entity placement. `rotation` is in degrees; the pivot is a fraction of the logical unit box.
pub struct EntityTransform {
    /// X position in viewport space.
    pub x: f64,
    /// Y position in viewport space.
    pub y: f64,
    /// Horizontal scale.
    pub scale_x: f64,
    /// Vertical scale.
    pub scale_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Pivot X in `[0, 1]` (default 0.5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot_x: Option<f64>,
    /// Pivot Y in `[0, 1]` (default 0.5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot_y: Option<f64>,
}

impl EntityTransform {
    /// Unscaled, unrotated placement at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            pivot_x: None,
            pivot_y: None,
        }
    }

    /// Same placement with a uniform scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Entity appearance.
pub struct EntityStyle {
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Multiplicative tint (`#RRGGBB[AA]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_hex: Option<String>,
    /// Compositing mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend_mode: Option<BlendMode>,
    /// Unrecognised keys, preserved on round-trip.
    #[serde(flatten)]
    pub extra: ParamBag,
}

impl Default for EntityStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            tint_hex: None,
            blend_mode: None,
            extra: ParamBag::new(),
        }
    }
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
/// Compositing mode for an entity. Unknown modes round-trip unchanged.
pub enum BlendMode {
    /// Source over.
    #[default]
    Normal,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
    /// Overlay.
    Overlay,
    /// Darken.
    Darken,
    /// Lighten.
    Lighten,
    /// Additive (plus).
    Add,
    /// Any other mode; drawn as `Normal`.
    Other(String),
}

impl BlendMode {
    /// Wire identifier (`normal`, `multiply`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::Add => "add",
            BlendMode::Other(s) => s,
        }
    }

    /// Whether this mode composites as plain source-over.
    pub fn is_normal(&self) -> bool {
        matches!(self, BlendMode::Normal | BlendMode::Other(_))
    }
}

impl From<String> for BlendMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "normal" => BlendMode::Normal,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "add" => BlendMode::Add,
            _ => BlendMode::Other(s),
        }
    }
}

impl From<BlendMode> for String {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
/// Identifier of a procedural motion. Unknown ids round-trip unchanged.
pub enum MotionId {
    /// Vertical bob.
    Float,
    /// Rotational wobble.
    Wiggle,
    /// Scale breathing.
    Pulse,
    /// Elliptical orbit.
    Orbit,
    /// Falling loop.
    Drip,
    /// Any other id; evaluated as a no-op.
    Other(String),
}

impl MotionId {
    /// All built-in motions.
    pub const BUILTIN: [MotionId; 5] = [
        MotionId::Float,
        MotionId::Wiggle,
        MotionId::Pulse,
        MotionId::Orbit,
        MotionId::Drip,
    ];

    /// Wire identifier (`MOTION_FLOAT`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            MotionId::Float => "MOTION_FLOAT",
            MotionId::Wiggle => "MOTION_WIGGLE",
            MotionId::Pulse => "MOTION_PULSE",
            MotionId::Orbit => "MOTION_ORBIT",
            MotionId::Drip => "MOTION_DRIP",
            MotionId::Other(s) => s,
        }
    }
}

impl From<String> for MotionId {
    fn from(s: String) -> Self {
        match s.as_str() {
            "MOTION_FLOAT" => MotionId::Float,
            "MOTION_WIGGLE" => MotionId::Wiggle,
            "MOTION_PULSE" => MotionId::Pulse,
            "MOTION_ORBIT" => MotionId::Orbit,
            "MOTION_DRIP" => MotionId::Drip,
            _ => MotionId::Other(s),
        }
    }
}

impl From<MotionId> for String {
    fn from(id: MotionId) -> Self {
        match id {
            MotionId::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// A motion attached to an entity.
pub struct MotionInstance {
    /// Instance identifier.
    pub id: String,
    /// Which motion to evaluate.
    pub motion_id: MotionId,
    /// Disabled motions contribute nothing.
    pub enabled: bool,
    /// Motion parameters; absent values use the evaluator defaults.
    #[serde(default)]
    pub params: MotionParams,
}

impl MotionInstance {
    /// Enabled instance with a fresh id and every parameter the motion reads filled with its
    /// default.
    pub fn preset(motion_id: MotionId) -> Self {
        let params = match motion_id {
            MotionId::Float | MotionId::Wiggle | MotionId::Pulse => MotionParams {
                speed: Some(0.5),
                intensity: Some(0.5),
                ..MotionParams::default()
            },
            MotionId::Orbit => MotionParams {
                speed: Some(0.5),
                radius_x: Some(40.0),
                radius_y: Some(24.0),
                phase_offset: Some(0.0),
                ..MotionParams::default()
            },
            MotionId::Drip => MotionParams {
                speed: Some(0.5),
                gravity: Some(0.5),
                ..MotionParams::default()
            },
            MotionId::Other(_) => MotionParams::default(),
        };
        Self {
            id: new_id("motion"),
            motion_id,
            enabled: true,
            params,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Motion parameters. Every field is optional.
pub struct MotionParams {
    /// Cycles per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Amplitude multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    /// Orbit horizontal radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_x: Option<f64>,
    /// Orbit vertical radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_y: Option<f64>,
    /// Orbit phase in radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_offset: Option<f64>,
    /// Drip fall multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<f64>,
    /// Reserved pulse amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_amount: Option<f64>,
    /// Unrecognised keys, preserved on round-trip.
    #[serde(flatten)]
    pub extra: ParamBag,
}

/// Generate a unique identifier of the form `<prefix>_<uuid>`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

/// Current time as an RFC 3339 timestamp.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Create a new scene with the default viewport, three default layers and an optional seed entity.
pub fn create_base_scene(name: &str, seed_asset: Option<&str>) -> ErrlScene {
    let now = now_timestamp();
    let viewport = SceneViewport::default();

    let mut background_layer = SceneLayer::new("layer_background", "Background", 0, 0.3);
    background_layer.is_background_plane = Some(true);
    let layers = vec![
        background_layer,
        SceneLayer::new("layer_main", "Main", 1, 1.0),
        SceneLayer::new("layer_foreground", "Foreground", 2, 1.5),
    ];

    let entities = seed_asset
        .map(|asset| {
            let transform =
                EntityTransform::at(viewport.width / 2.0, viewport.height / 2.0).with_scale(0.25);
            vec![SceneEntity::new(asset, "layer_main", transform)]
        })
        .unwrap_or_default();

    ErrlScene {
        version: SCENE_VERSION,
        id: new_id("scene"),
        name: name.to_string(),
        created_at: now.clone(),
        updated_at: now,
        viewport,
        background: SceneBackground {
            scene_id: "default".to_string(),
            mood_id: "default".to_string(),
            planes: BackgroundPlanes::default(),
            params: None,
        },
        fx: SceneFx::default(),
        weather: Vec::new(),
        layers,
        entities,
    }
}

impl ErrlScene {
    /// Lookup a layer by id.
    pub fn layer(&self, id: &str) -> Option<&SceneLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Lookup an entity by id.
    pub fn entity(&self, id: &str) -> Option<&SceneEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Entities of `layer_id` in paint order.
    pub fn entities_in_layer<'a>(&'a self, layer_id: &str) -> Vec<&'a SceneEntity> {
        let mut out: Vec<(usize, &SceneEntity)> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.layer_id == layer_id)
            .collect();
        out.sort_by_key(|(i, e)| (e.order, *i));
        out.into_iter().map(|(_, e)| e).collect()
    }

    /// Recompute dense per-layer ranks from `(order, array index)`.
    pub fn normalize_entity_order(&mut self) {
        let mut by_layer: HashMap<&str, Vec<(u32, usize)>> = HashMap::new();
        for (i, e) in self.entities.iter().enumerate() {
            by_layer.entry(&e.layer_id).or_default().push((e.order, i));
        }
        let mut ranks = vec![0u32; self.entities.len()];
        for members in by_layer.values_mut() {
            members.sort();
            for (rank, &(_, i)) in members.iter().enumerate() {
                ranks[i] = rank as u32;
            }
        }
        for (e, rank) in self.entities.iter_mut().zip(ranks) {
            e.order = rank;
        }
    }

    /// Validate structural invariants: ids, references, finite numbers.
    pub fn validate(&self) -> SceneResult<()> {
        let vp = &self.viewport;
        if !(vp.width.is_finite() && vp.width > 0.0 && vp.height.is_finite() && vp.height > 0.0) {
            return Err(SceneError::validation(
                "viewport width/height must be finite and > 0",
            ));
        }
        if let Some(m) = vp.safe_margin
            && (!m.is_finite() || m < 0.0)
        {
            return Err(SceneError::validation(
                "viewport safe_margin must be finite and >= 0",
            ));
        }

        let mut layer_ids = HashSet::new();
        for layer in &self.layers {
            if layer.id.trim().is_empty() {
                return Err(SceneError::validation("layer id must be non-empty"));
            }
            if !layer_ids.insert(layer.id.as_str()) {
                return Err(SceneError::validation(format!(
                    "duplicate layer id '{}'",
                    layer.id
                )));
            }
            if !layer.z_depth.is_finite() {
                return Err(SceneError::validation(format!(
                    "layer '{}' z_depth must be finite",
                    layer.id
                )));
            }
        }

        let mut entity_ids = HashSet::new();
        for e in &self.entities {
            if e.id.trim().is_empty() {
                return Err(SceneError::validation("entity id must be non-empty"));
            }
            if !entity_ids.insert(e.id.as_str()) {
                return Err(SceneError::validation(format!(
                    "duplicate entity id '{}'",
                    e.id
                )));
            }
            if !layer_ids.contains(e.layer_id.as_str()) {
                return Err(SceneError::validation(format!(
                    "entity '{}' references missing layer '{}'",
                    e.id, e.layer_id
                )));
            }
            let t = &e.transform;
            let finite = [t.x, t.y, t.scale_x, t.scale_y, t.rotation]
                .into_iter()
                .chain(t.pivot_x)
                .chain(t.pivot_y)
                .all(f64::is_finite);
            if !finite {
                return Err(SceneError::validation(format!(
                    "entity '{}' transform must be finite",
                    e.id
                )));
            }
            if !(0.0..=1.0).contains(&e.style.opacity) {
                return Err(SceneError::validation(format!(
                    "entity '{}' opacity must be in [0, 1]",
                    e.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
