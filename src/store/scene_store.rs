use std::collections::HashSet;
use std::sync::Arc;

use crate::history::manager::{DEFAULT_HISTORY_CAPACITY, HistoryManager};
use crate::scene::model::{
    ErrlScene, FxInstance, SceneBackground, SceneEntity, SceneLayer, SceneViewport,
    SceneWeatherConfig, new_id, now_timestamp,
};

/// Options controlling [`SceneStore`] behavior.
#[derive(Clone, Debug)]
pub struct StoreOpts {
    /// Maximum undo (and redo) depth. Overridable through `ERRL_HISTORY_CAPACITY`.
    pub history_capacity: usize,
}

impl Default for StoreOpts {
    fn default() -> Self {
        let history_capacity = std::env::var("ERRL_HISTORY_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_HISTORY_CAPACITY);
        Self { history_capacity }
    }
}

/// Direction for [`SceneStore::reorder_entity_in_layer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Towards the front (painted later).
    Up,
    /// Towards the back (painted earlier).
    Down,
}

/// What kind of state a [`StoreChange`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Scene content changed (mutation, undo, redo, or replacement).
    Scene,
    /// Entity or layer selection changed.
    Selection,
    /// Playback time changed.
    Playback,
}

/// Notification delivered to store subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreChange {
    /// What changed.
    pub kind: ChangeKind,
    /// Scene revision after the change.
    pub revision: u64,
    /// Whether undo is available after the change.
    pub can_undo: bool,
    /// Whether redo is available after the change.
    pub can_redo: bool,
}

/// Handle returned by [`SceneStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Scene-level fields editable through [`SceneStore::update_scene_meta`].
#[derive(Clone, Debug, PartialEq)]
pub struct SceneMeta {
    /// Display name.
    pub name: String,
    /// Logical canvas.
    pub viewport: SceneViewport,
    /// Background description.
    pub background: SceneBackground,
}

type Listener = Box<dyn FnMut(&StoreChange) + Send>;

/// The single mutation surface for scene content.
///
/// Every content mutation clones the current scene, applies the change, and publishes the result
/// as a new immutable snapshot; the previous snapshot goes on the undo stack. Referencing an id
/// that does not exist is a silent no-op that records nothing and returns `false`.
///
/// Selection and playback time are view state and are never recorded in history.
pub struct SceneStore {
    history: HistoryManager<Arc<ErrlScene>>,
    playback_time_ms: f64,
    selected_entity_ids: Vec<String>,
    selected_layer_id: Option<String>,
    revision: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl SceneStore {
    /// Create a store owning `scene` with empty history.
    pub fn new(scene: ErrlScene, opts: StoreOpts) -> Self {
        let mut scene = scene;
        scene.normalize_entity_order();
        Self {
            history: HistoryManager::new(Arc::new(scene), opts.history_capacity),
            playback_time_ms: 0.0,
            selected_entity_ids: Vec::new(),
            selected_layer_id: None,
            revision: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Current scene snapshot. Cheap to clone and never mutated after publication.
    pub fn scene(&self) -> &Arc<ErrlScene> {
        self.history.present()
    }

    /// Monotonic counter bumped on every scene change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether [`SceneStore::undo`] would do anything.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether [`SceneStore::redo`] would do anything.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Current playback time in milliseconds.
    pub fn playback_time_ms(&self) -> f64 {
        self.playback_time_ms
    }

    /// Selected entity ids, in selection order.
    pub fn selected_entity_ids(&self) -> &[String] {
        &self.selected_entity_ids
    }

    /// Selected layer id, if any.
    pub fn selected_layer_id(&self) -> Option<&str> {
        self.selected_layer_id.as_deref()
    }

    /// Register a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreChange) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Replace the whole scene (e.g. after loading a file). Resets history.
    pub fn set_scene(&mut self, scene: ErrlScene) {
        let mut scene = scene;
        scene.normalize_entity_order();
        self.history.reset(Arc::new(scene));
        self.revision += 1;
        self.prune_selection();
        self.notify(ChangeKind::Scene);
    }

    /// Restore the previous snapshot. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.history.undo().is_none() {
            return false;
        }
        self.revision += 1;
        self.prune_selection();
        self.notify(ChangeKind::Scene);
        true
    }

    /// Re-apply the next snapshot. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if self.history.redo().is_none() {
            return false;
        }
        self.revision += 1;
        self.prune_selection();
        self.notify(ChangeKind::Scene);
        true
    }

    /// Append an entity at the end of its layer. Returns its id, or `None` if the layer is missing.
    ///
    /// An empty or already-used id is replaced with a fresh one.
    pub fn add_entity(&mut self, entity: SceneEntity) -> Option<String> {
        let mut entity = entity;
        let mut id = None;
        self.commit(|scene| {
            scene.layer(&entity.layer_id)?;
            if entity.id.trim().is_empty() || scene.entity(&entity.id).is_some() {
                entity.id = new_id("entity");
            }
            entity.order = layer_len(scene, &entity.layer_id);
            id = Some(entity.id.clone());
            scene.entities.push(entity);
            Some(())
        });
        id
    }

    /// Edit an entity in place.
    ///
    /// The id and in-layer rank cannot be changed here (use
    /// [`SceneStore::reorder_entity_in_layer`]). Moving to a missing layer is rejected; a valid
    /// move appends the entity at the end of the target layer.
    pub fn update_entity(&mut self, id: &str, f: impl FnOnce(&mut SceneEntity)) -> bool {
        self.commit(|scene| {
            let idx = scene.entities.iter().position(|e| e.id == id)?;
            let mut next = scene.entities[idx].clone();
            f(&mut next);
            next.id = id.to_string();

            let old_layer = scene.entities[idx].layer_id.clone();
            if next.layer_id == old_layer {
                next.order = scene.entities[idx].order;
                scene.entities[idx] = next;
                return Some(());
            }

            scene.layer(&next.layer_id)?;
            scene.entities.remove(idx);
            next.order = layer_len(scene, &next.layer_id);
            scene.entities.push(next);
            scene.normalize_entity_order();
            Some(())
        })
    }

    /// Remove an entity and drop it from the selection.
    pub fn remove_entity(&mut self, id: &str) -> bool {
        self.commit(|scene| {
            let idx = scene.entities.iter().position(|e| e.id == id)?;
            scene.entities.remove(idx);
            scene.normalize_entity_order();
            Some(())
        })
    }

    /// Swap an entity with its neighbour within its layer. Out-of-range moves are no-ops.
    pub fn reorder_entity_in_layer(&mut self, id: &str, direction: ReorderDirection) -> bool {
        self.commit(|scene| {
            let entity = scene.entity(id)?;
            let layer_id = entity.layer_id.clone();

            let mut siblings: Vec<usize> = scene
                .entities
                .iter()
                .enumerate()
                .filter(|(_, e)| e.layer_id == layer_id)
                .map(|(i, _)| i)
                .collect();
            siblings.sort_by_key(|&i| (scene.entities[i].order, i));

            let pos = siblings.iter().position(|&i| scene.entities[i].id == id)?;
            let target = match direction {
                ReorderDirection::Up => pos.checked_add(1).filter(|&p| p < siblings.len())?,
                ReorderDirection::Down => pos.checked_sub(1)?,
            };

            let (a, b) = (siblings[pos], siblings[target]);
            let (order_a, order_b) = (scene.entities[a].order, scene.entities[b].order);
            scene.entities.swap(a, b);
            scene.entities[a].order = order_a;
            scene.entities[b].order = order_b;
            Some(())
        })
    }

    /// Add a layer. Returns its id; an empty or already-used id is replaced with a fresh one.
    pub fn add_layer(&mut self, layer: SceneLayer) -> String {
        let mut layer = layer;
        let mut id = String::new();
        self.commit(|scene| {
            if layer.id.trim().is_empty() || scene.layer(&layer.id).is_some() {
                layer.id = new_id("layer");
            }
            id = layer.id.clone();
            scene.layers.push(layer);
            Some(())
        });
        id
    }

    /// Edit a layer in place. The id cannot be changed.
    pub fn update_layer(&mut self, id: &str, f: impl FnOnce(&mut SceneLayer)) -> bool {
        self.commit(|scene| {
            let layer = scene.layers.iter_mut().find(|l| l.id == id)?;
            f(layer);
            layer.id = id.to_string();
            Some(())
        })
    }

    /// Remove a layer together with every entity on it.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        self.commit(|scene| {
            let idx = scene.layers.iter().position(|l| l.id == id)?;
            scene.layers.remove(idx);
            scene.entities.retain(|e| e.layer_id != id);
            Some(())
        })
    }

    /// Assign `z_index` from list position.
    ///
    /// Layers absent from `ordered_ids` are removed, and so are their entities. Unknown or repeated
    /// ids are ignored.
    pub fn reorder_layers<S: AsRef<str>>(&mut self, ordered_ids: &[S]) -> bool {
        self.commit(|scene| {
            let mut remaining = std::mem::take(&mut scene.layers);
            let mut next = Vec::with_capacity(remaining.len());
            for id in ordered_ids {
                let id = id.as_ref();
                if let Some(pos) = remaining.iter().position(|l| l.id == id) {
                    let mut layer = remaining.remove(pos);
                    layer.z_index = i32::try_from(next.len()).unwrap_or(i32::MAX);
                    next.push(layer);
                }
            }

            if !remaining.is_empty() {
                let dropped: Vec<&str> = remaining.iter().map(|l| l.id.as_str()).collect();
                tracing::warn!(
                    dropped = ?dropped,
                    "reorder_layers omitted layers; removing them and their entities"
                );
                scene
                    .entities
                    .retain(|e| !remaining.iter().any(|l| l.id == e.layer_id));
            }

            scene.layers = next;
            Some(())
        })
    }

    /// Add a scene-level effect. Returns its id.
    pub fn add_fx(&mut self, fx: FxInstance) -> String {
        let mut fx = fx;
        let mut id = String::new();
        self.commit(|scene| {
            if fx.id.trim().is_empty() || scene.fx.global_fx.iter().any(|f| f.id == fx.id) {
                fx.id = new_id("fx");
            }
            id = fx.id.clone();
            scene.fx.global_fx.push(fx);
            Some(())
        });
        id
    }

    /// Edit a scene-level effect in place.
    pub fn update_fx(&mut self, id: &str, f: impl FnOnce(&mut FxInstance)) -> bool {
        self.commit(|scene| {
            let fx = scene.fx.global_fx.iter_mut().find(|x| x.id == id)?;
            f(fx);
            fx.id = id.to_string();
            Some(())
        })
    }

    /// Remove a scene-level effect.
    pub fn remove_fx(&mut self, id: &str) -> bool {
        self.commit(|scene| {
            let idx = scene.fx.global_fx.iter().position(|x| x.id == id)?;
            scene.fx.global_fx.remove(idx);
            Some(())
        })
    }

    /// Add a weather layer. Returns its id.
    pub fn add_weather(&mut self, weather: SceneWeatherConfig) -> String {
        let mut weather = weather;
        let mut id = String::new();
        self.commit(|scene| {
            if weather.id.trim().is_empty() || scene.weather.iter().any(|w| w.id == weather.id) {
                weather.id = new_id("weather");
            }
            id = weather.id.clone();
            scene.weather.push(weather);
            Some(())
        });
        id
    }

    /// Edit a weather layer in place.
    pub fn update_weather(&mut self, id: &str, f: impl FnOnce(&mut SceneWeatherConfig)) -> bool {
        self.commit(|scene| {
            let w = scene.weather.iter_mut().find(|w| w.id == id)?;
            f(w);
            w.id = id.to_string();
            Some(())
        })
    }

    /// Remove a weather layer.
    pub fn remove_weather(&mut self, id: &str) -> bool {
        self.commit(|scene| {
            let idx = scene.weather.iter().position(|w| w.id == id)?;
            scene.weather.remove(idx);
            Some(())
        })
    }

    /// Edit name, viewport and background.
    pub fn update_scene_meta(&mut self, f: impl FnOnce(&mut SceneMeta)) -> bool {
        self.commit(|scene| {
            let mut meta = SceneMeta {
                name: scene.name.clone(),
                viewport: scene.viewport.clone(),
                background: scene.background.clone(),
            };
            f(&mut meta);
            scene.name = meta.name;
            scene.viewport = meta.viewport;
            scene.background = meta.background;
            Some(())
        })
    }

    /// Replace the entity selection. Ids not present in the scene are dropped.
    pub fn set_selected_entities<S: AsRef<str>>(&mut self, ids: &[S]) {
        let scene = self.history.present();
        let mut seen = HashSet::new();
        self.selected_entity_ids = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| scene.entity(id).is_some() && seen.insert(*id))
            .map(str::to_string)
            .collect();
        self.notify(ChangeKind::Selection);
    }

    /// Select a layer, or clear the layer selection. Unknown ids clear it.
    pub fn set_selected_layer(&mut self, id: Option<&str>) {
        let scene = self.history.present();
        self.selected_layer_id = id.filter(|id| scene.layer(id).is_some()).map(str::to_string);
        self.notify(ChangeKind::Selection);
    }

    /// Set playback time in milliseconds. Non-finite values are ignored.
    pub fn set_playback_time(&mut self, ms: f64) {
        if !ms.is_finite() {
            return;
        }
        self.playback_time_ms = ms;
        self.notify(ChangeKind::Playback);
    }

    fn commit(&mut self, f: impl FnOnce(&mut ErrlScene) -> Option<()>) -> bool {
        let mut next = ErrlScene::clone(self.history.present());
        if f(&mut next).is_none() {
            return false;
        }
        next.updated_at = now_timestamp();
        self.history.push_state(Arc::new(next));
        self.revision += 1;
        self.prune_selection();
        self.notify(ChangeKind::Scene);
        true
    }

    fn prune_selection(&mut self) {
        let scene = self.history.present();
        self.selected_entity_ids.retain(|id| scene.entity(id).is_some());
        if self
            .selected_layer_id
            .as_deref()
            .is_some_and(|id| scene.layer(id).is_none())
        {
            self.selected_layer_id = None;
        }
    }

    fn notify(&mut self, kind: ChangeKind) {
        let change = StoreChange {
            kind,
            revision: self.revision,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }
}

fn layer_len(scene: &ErrlScene, layer_id: &str) -> u32 {
    let n = scene
        .entities
        .iter()
        .filter(|e| e.layer_id == layer_id)
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[path = "../../tests/unit/store/scene_store.rs"]
mod tests;
