use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{SceneError, SceneResult};
use crate::scene::model::ParamBag;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Registry entry describing where an asset's content lives.
pub struct AssetRecord {
    /// Asset identifier referenced by `SceneEntity::asset_id` and background planes.
    pub id: String,
    /// Path handed to the [`crate::AssetSource`] when the content is fetched.
    pub file_path: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Any other manifest fields.
    #[serde(flatten)]
    pub extra: ParamBag,
}

impl AssetRecord {
    /// Record with only an id and a path.
    pub fn new(id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            name: None,
            tags: Vec::new(),
            extra: ParamBag::new(),
        }
    }
}

/// Maps asset ids to fetchable records.
///
/// `None` means the id is unknown, which the renderer draws as a missing-reference fallback rather
/// than a loading placeholder.
pub trait AssetRegistry: Send + Sync {
    /// Lookup an asset by id.
    fn get_asset_by_id(&self, asset_id: &str) -> Option<&AssetRecord>;
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
struct Manifest {
    assets: Vec<AssetRecord>,
}

/// In-memory registry, typically loaded from a JSON manifest `{ "assets": [ ... ] }`.
#[derive(Clone, Debug, Default)]
pub struct StaticAssetRegistry {
    assets: HashMap<String, AssetRecord>,
}

impl StaticAssetRegistry {
    /// Build from records. Later duplicates replace earlier ones.
    pub fn new(records: impl IntoIterator<Item = AssetRecord>) -> Self {
        let assets = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { assets }
    }

    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        let m: Manifest = serde_json::from_str(json)
            .map_err(|e| SceneError::serde(format!("parse asset manifest JSON: {e}")))?;
        Ok(Self::new(m.assets))
    }

    /// Read a manifest from disk.
    pub fn from_path(path: impl AsRef<Path>) -> SceneResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("open asset manifest '{}'", path.display()))?;
        let m: Manifest = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            SceneError::serde(format!("parse asset manifest '{}': {e}", path.display()))
        })?;
        Ok(Self::new(m.assets))
    }

    /// Add or replace a record.
    pub fn insert(&mut self, record: AssetRecord) {
        self.assets.insert(record.id.clone(), record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// `true` when the registry has no records.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetRegistry for StaticAssetRegistry {
    fn get_asset_by_id(&self, asset_id: &str) -> Option<&AssetRecord> {
        self.assets.get(asset_id)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/registry.rs"]
mod tests;
