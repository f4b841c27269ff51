use super::*;
use crate::scene::model::{
    BlendMode, EntityTransform, MotionId, MotionInstance, SceneEntity, create_base_scene,
};

#[test]
fn export_then_import_is_structurally_equal() {
    let mut scene = create_base_scene("Round trip", Some("errl-face"));
    scene.entities[0]
        .motion
        .push(MotionInstance::preset(MotionId::Float));
    scene.entities[0]
        .metadata
        .insert("note".to_string(), serde_json::json!({"k": [1, 2]}));

    let json = export_scene(&scene).unwrap();
    assert!(json.contains("\n  \"version\""));
    assert!(json.contains("\"layerId\": \"layer_main\""));
    assert!(json.contains("\"motionId\": \"MOTION_FLOAT\""));

    let back = import_scene(&json).unwrap();
    assert_eq!(back, scene);
}

#[test]
fn unknown_blend_mode_survives_import_and_export() {
    let mut scene = create_base_scene("Blend", Some("errl-face"));
    scene.entities[0].style.blend_mode = Some(BlendMode::Screen);
    let json = export_scene(&scene)
        .unwrap()
        .replace("\"blendMode\": \"screen\"", "\"blendMode\": \"color-dodge\"");

    let back = import_scene(&json).unwrap();
    let mode = back.entities[0].style.blend_mode.clone().unwrap();
    assert_eq!(mode, BlendMode::Other("color-dodge".to_string()));
    assert!(mode.is_normal());

    let again = export_scene(&back).unwrap();
    assert!(again.contains("\"blendMode\": \"color-dodge\""));
    assert!(!again.contains("unknown"));
    assert_eq!(import_scene(&again).unwrap(), back);
}

#[test]
fn import_rejects_malformed_json() {
    let err = import_scene("{ not json").unwrap_err();
    assert!(matches!(err, SceneError::Serde(_)));
}

#[test]
fn import_does_not_validate_but_validated_variant_does() {
    let mut scene = create_base_scene("Orphan", None);
    scene.entities.push(SceneEntity::new(
        "a",
        "layer_gone",
        EntityTransform::at(1.0, 1.0),
    ));
    let json = export_scene(&scene).unwrap();

    assert!(import_scene(&json).is_ok());
    let err = import_scene_validated(&json).unwrap_err();
    assert!(matches!(err, SceneError::Validation(_)));
}

#[test]
fn save_and_load_round_trip_on_disk() {
    let dir = std::path::PathBuf::from("target").join("scene_io_unit");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scene.json");

    let scene = create_base_scene("Disk", Some("errl-face"));
    save_scene(&path, &scene).unwrap();
    let back = load_scene(&path).unwrap();
    assert_eq!(back, scene);

    assert!(load_scene(dir.join("missing.json")).is_err());
}
