use super::*;

#[test]
fn manifest_parses_camel_case_and_keeps_extra_fields() {
    let reg = StaticAssetRegistry::from_json(
        r#"{ "assets": [
            { "id": "errl-face", "filePath": "faces/errl.svg", "name": "Errl", "palette": "neon" },
            { "id": "drip", "filePath": "fx/drip.png", "tags": ["goo"] }
        ] }"#,
    )
    .unwrap();
    assert_eq!(reg.len(), 2);

    let face = reg.get_asset_by_id("errl-face").unwrap();
    assert_eq!(face.file_path, "faces/errl.svg");
    assert_eq!(face.name.as_deref(), Some("Errl"));
    assert_eq!(face.extra.get("palette"), Some(&serde_json::json!("neon")));
    assert_eq!(reg.get_asset_by_id("drip").unwrap().tags, ["goo"]);
    assert!(reg.get_asset_by_id("nope").is_none());
}

#[test]
fn malformed_manifest_is_a_serde_error() {
    let err = StaticAssetRegistry::from_json(r#"{ "assets": [ { "id": 1 } ] }"#).unwrap_err();
    assert!(matches!(err, SceneError::Serde(_)));
}

#[test]
fn insert_replaces_by_id() {
    let mut reg = StaticAssetRegistry::default();
    assert!(reg.is_empty());
    reg.insert(AssetRecord::new("a", "one.png"));
    reg.insert(AssetRecord::new("a", "two.png"));
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.get_asset_by_id("a").unwrap().file_path, "two.png");
}
