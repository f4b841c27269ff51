use super::*;
use crate::scene::model::{EntityTransform, create_base_scene};
use std::sync::Mutex;

fn store_with_entities() -> (SceneStore, Vec<String>) {
    let mut store = SceneStore::new(create_base_scene("store", None), StoreOpts::default());
    let ids = ["a", "b", "c"]
        .into_iter()
        .map(|asset| {
            store
                .add_entity(SceneEntity::new(
                    asset,
                    "layer_main",
                    EntityTransform::at(10.0, 10.0),
                ))
                .unwrap()
        })
        .collect();
    (store, ids)
}

fn layer_order(store: &SceneStore, layer: &str) -> Vec<String> {
    store
        .scene()
        .entities_in_layer(layer)
        .iter()
        .map(|e| e.asset_id.clone())
        .collect()
}

#[test]
fn add_entity_requires_existing_layer() {
    let mut store = SceneStore::new(create_base_scene("s", None), StoreOpts::default());
    let id = store.add_entity(SceneEntity::new("x", "nope", EntityTransform::at(0.0, 0.0)));
    assert!(id.is_none());
    assert!(!store.can_undo());
    assert_eq!(store.revision(), 0);
}

#[test]
fn duplicate_entity_ids_are_replaced() {
    let (mut store, ids) = store_with_entities();
    let mut dup = SceneEntity::new("d", "layer_main", EntityTransform::at(0.0, 0.0));
    dup.id = ids[0].clone();
    let new = store.add_entity(dup).unwrap();
    assert_ne!(new, ids[0]);
    store.scene().validate().unwrap();
}

#[test]
fn missing_ids_are_silent_no_ops() {
    let (mut store, _) = store_with_entities();
    let before = store.scene().clone();
    let rev = store.revision();

    assert!(!store.update_entity("ghost", |e| e.transform.x = 1.0));
    assert!(!store.remove_entity("ghost"));
    assert!(!store.update_layer("ghost", |l| l.visible = false));
    assert!(!store.remove_layer("ghost"));
    assert!(!store.remove_fx("ghost"));
    assert!(!store.update_weather("ghost", |w| w.enabled = false));

    assert_eq!(store.revision(), rev);
    assert!(Arc::ptr_eq(store.scene(), &before));
}

#[test]
fn update_entity_keeps_id_and_rejects_missing_layer() {
    let (mut store, ids) = store_with_entities();
    assert!(store.update_entity(&ids[0], |e| {
        e.id = "hijack".to_string();
        e.transform.x = 42.0;
    }));
    let e = store.scene().entity(&ids[0]).unwrap();
    assert_eq!(e.transform.x, 42.0);

    assert!(!store.update_entity(&ids[0], |e| e.layer_id = "nope".to_string()));
    assert_eq!(store.scene().entity(&ids[0]).unwrap().layer_id, "layer_main");
}

#[test]
fn moving_entity_to_another_layer_appends_it() {
    let (mut store, ids) = store_with_entities();
    let fg = store
        .add_entity(SceneEntity::new(
            "f",
            "layer_foreground",
            EntityTransform::at(0.0, 0.0),
        ))
        .unwrap();
    assert!(store.update_entity(&ids[0], |e| e.layer_id = "layer_foreground".to_string()));

    assert_eq!(layer_order(&store, "layer_main"), ["b", "c"]);
    assert_eq!(layer_order(&store, "layer_foreground"), ["f", "a"]);
    let scene = store.scene();
    assert_eq!(scene.entity(&fg).unwrap().order, 0);
    assert_eq!(scene.entity(&ids[0]).unwrap().order, 1);
    assert_eq!(scene.entity(&ids[1]).unwrap().order, 0);
}

#[test]
fn reorder_entity_in_layer_swaps_neighbours() {
    let (mut store, ids) = store_with_entities();
    assert!(store.reorder_entity_in_layer(&ids[0], ReorderDirection::Up));
    assert_eq!(layer_order(&store, "layer_main"), ["b", "a", "c"]);

    assert!(store.reorder_entity_in_layer(&ids[2], ReorderDirection::Down));
    assert_eq!(layer_order(&store, "layer_main"), ["b", "c", "a"]);

    // already at the edges
    assert!(!store.reorder_entity_in_layer(&ids[0], ReorderDirection::Up));
    assert!(!store.reorder_entity_in_layer(&ids[1], ReorderDirection::Down));

    let arr: Vec<&str> = store
        .scene()
        .entities
        .iter()
        .map(|e| e.asset_id.as_str())
        .collect();
    assert_eq!(arr, ["b", "c", "a"]);
}

#[test]
fn reorder_ignores_other_layers() {
    let (mut store, ids) = store_with_entities();
    store.add_entity(SceneEntity::new(
        "f",
        "layer_foreground",
        EntityTransform::at(0.0, 0.0),
    ));
    assert!(store.reorder_entity_in_layer(&ids[2], ReorderDirection::Down));
    assert_eq!(layer_order(&store, "layer_main"), ["a", "c", "b"]);
    assert_eq!(layer_order(&store, "layer_foreground"), ["f"]);
}

#[test]
fn remove_layer_cascades_and_clears_selection() {
    let (mut store, ids) = store_with_entities();
    store.set_selected_layer(Some("layer_main"));
    store.set_selected_entities(&[ids[0].as_str(), ids[1].as_str()]);
    assert_eq!(store.selected_entity_ids().len(), 2);

    assert!(store.remove_layer("layer_main"));
    let scene = store.scene();
    assert!(scene.layer("layer_main").is_none());
    assert!(scene.entities.is_empty());
    assert_eq!(store.selected_layer_id(), None);
    assert!(store.selected_entity_ids().is_empty());
}

#[test]
fn remove_entity_prunes_selection() {
    let (mut store, ids) = store_with_entities();
    store.set_selected_entities(&[&ids[0], &ids[1]]);
    assert!(store.remove_entity(&ids[0]));
    assert_eq!(store.selected_entity_ids(), [ids[1].clone()]);
}

#[test]
fn selection_ignores_unknown_and_duplicate_ids() {
    let (mut store, ids) = store_with_entities();
    store.set_selected_entities(&[ids[0].as_str(), "ghost", ids[0].as_str()]);
    assert_eq!(store.selected_entity_ids(), [ids[0].clone()]);
    store.set_selected_layer(Some("ghost"));
    assert_eq!(store.selected_layer_id(), None);
}

#[test]
fn selection_and_time_are_not_history() {
    let (mut store, ids) = store_with_entities();
    let depth = store.scene().entities.len();
    let rev = store.revision();
    store.set_selected_entities(&[&ids[0]]);
    store.set_playback_time(1500.0);
    store.set_playback_time(f64::NAN);
    assert_eq!(store.playback_time_ms(), 1500.0);
    assert_eq!(store.revision(), rev);
    assert!(store.undo());
    assert_eq!(store.scene().entities.len(), depth - 1);
}

#[test]
fn reorder_layers_assigns_positions_and_drops_omitted() {
    let (mut store, _) = store_with_entities();
    assert!(store.reorder_layers(&["layer_foreground", "layer_background", "layer_main"]));
    let z: Vec<(&str, i32)> = store
        .scene()
        .layers
        .iter()
        .map(|l| (l.id.as_str(), l.z_index))
        .collect();
    assert_eq!(
        z,
        [
            ("layer_foreground", 0),
            ("layer_background", 1),
            ("layer_main", 2)
        ]
    );

    assert!(store.reorder_layers(&["layer_background", "unknown", "layer_foreground"]));
    let scene = store.scene();
    assert_eq!(scene.layers.len(), 2);
    assert!(scene.layer("layer_main").is_none());
    assert!(scene.entities.is_empty());
    scene.validate().unwrap();
}

#[test]
fn undo_restores_state_and_new_mutation_clears_redo() {
    let (mut store, ids) = store_with_entities();
    let before = store.scene().clone();
    assert!(store.update_entity(&ids[1], |e| e.style.opacity = 0.2));
    assert!(store.undo());
    assert_eq!(**store.scene(), *before);
    assert!(store.can_redo());

    assert!(store.update_layer("layer_main", |l| l.locked = true));
    assert!(!store.can_redo());
    assert!(!store.redo());
}

#[test]
fn snapshots_are_independent_of_later_mutations() {
    let (mut store, ids) = store_with_entities();
    let snapshot = store.scene().clone();
    let x = snapshot.entity(&ids[0]).unwrap().transform.x;
    store.update_entity(&ids[0], |e| e.transform.x += 100.0);
    assert_eq!(snapshot.entity(&ids[0]).unwrap().transform.x, x);
}

#[test]
fn undo_prunes_selection_of_entities_that_no_longer_exist() {
    let mut store = SceneStore::new(create_base_scene("s", None), StoreOpts::default());
    let id = store
        .add_entity(SceneEntity::new("x", "layer_main", EntityTransform::at(0.0, 0.0)))
        .unwrap();
    store.set_selected_entities(&[&id]);
    assert!(store.undo());
    assert!(store.selected_entity_ids().is_empty());
}

#[test]
fn fx_weather_and_meta_mutations() {
    let mut store = SceneStore::new(create_base_scene("s", None), StoreOpts::default());
    let fx = store.add_fx(FxInstance {
        id: String::new(),
        fx_id: "FX_GLOW".to_string(),
        enabled: true,
        params: Default::default(),
    });
    assert!(store.update_fx(&fx, |f| f.enabled = false));
    assert!(!store.scene().fx.global_fx[0].enabled);

    let w = store.add_weather(SceneWeatherConfig {
        id: "rain".to_string(),
        weather_id: "WEATHER_RAIN".to_string(),
        enabled: true,
        params: Default::default(),
    });
    assert_eq!(w, "rain");
    assert!(store.remove_weather("rain"));
    assert!(store.remove_fx(&fx));

    assert!(store.update_scene_meta(|m| {
        m.name = "Renamed".to_string();
        m.viewport.safe_margin = None;
    }));
    assert_eq!(store.scene().name, "Renamed");
    assert_eq!(store.scene().viewport.safe_margin, None);
}

#[test]
fn set_scene_resets_history_and_prunes_selection() {
    let (mut store, ids) = store_with_entities();
    store.set_selected_entities(&[&ids[0]]);
    store.set_scene(create_base_scene("fresh", None));
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert!(store.selected_entity_ids().is_empty());
    assert_eq!(store.scene().name, "fresh");
}

#[test]
fn subscribers_see_flags_and_kinds() {
    let (mut store, ids) = store_with_entities();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = store.subscribe(move |c| sink.lock().unwrap().push(*c));

    store.remove_entity(&ids[0]);
    store.undo();
    store.set_playback_time(10.0);
    store.set_selected_layer(None);

    {
        let seen = seen.lock().unwrap();
        let kinds: Vec<ChangeKind> = seen.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [
                ChangeKind::Scene,
                ChangeKind::Scene,
                ChangeKind::Playback,
                ChangeKind::Selection
            ]
        );
        assert!(seen[0].can_undo);
        assert!(seen[1].can_redo);
        assert!(seen[1].revision > seen[0].revision);
    }

    assert!(store.unsubscribe(listener));
    assert!(!store.unsubscribe(listener));
    store.set_playback_time(20.0);
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[test]
fn history_capacity_bounds_undo_depth() {
    let mut store = SceneStore::new(
        create_base_scene("s", None),
        StoreOpts {
            history_capacity: 2,
        },
    );
    for i in 0..5 {
        store.update_scene_meta(|m| m.name = format!("n{i}"));
    }
    assert!(store.undo());
    assert!(store.undo());
    assert!(!store.undo());
    assert_eq!(store.scene().name, "n2");
}
