use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{SceneError, SceneResult};
use crate::scene::model::ErrlScene;

/// Serialize a scene as pretty-printed JSON.
pub fn export_scene(scene: &ErrlScene) -> SceneResult<String> {
    Ok(serde_json::to_string_pretty(scene)?)
}

/// Parse a scene from JSON. Only the JSON shape is checked; see [`import_scene_validated`].
#[tracing::instrument(skip(json), fields(len = json.len()))]
pub fn import_scene(json: &str) -> SceneResult<ErrlScene> {
    serde_json::from_str(json).map_err(|e| SceneError::serde(format!("parse scene JSON: {e}")))
}

/// Parse a scene from JSON and check its structural invariants.
pub fn import_scene_validated(json: &str) -> SceneResult<ErrlScene> {
    let scene = import_scene(json)?;
    scene.validate()?;
    Ok(scene)
}

/// Read and validate a scene document from disk.
pub fn load_scene(path: impl AsRef<Path>) -> SceneResult<ErrlScene> {
    let path = path.as_ref();
    let f = File::open(path)
        .with_context(|| format!("open scene JSON '{}'", path.display()))?;
    let scene: ErrlScene = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
        SceneError::serde(format!("parse scene JSON '{}': {e}", path.display()))
    })?;
    scene.validate()?;
    Ok(scene)
}

/// Write a scene document to disk as pretty-printed JSON.
pub fn save_scene(path: impl AsRef<Path>, scene: &ErrlScene) -> SceneResult<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create '{}'", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, scene)?;
    w.write_all(b"\n")
        .and_then(|_| w.flush())
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/scene/io.rs"]
mod tests;
