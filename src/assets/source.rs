use std::path::PathBuf;

use anyhow::Context;

use crate::foundation::error::{SceneError, SceneResult};

/// Fetches raw asset bytes by registry file path. Called from loader threads.
pub trait AssetSource: Send + Sync {
    /// Read the bytes behind `file_path`.
    fn fetch(&self, file_path: &str) -> SceneResult<Vec<u8>>;
}

/// Reads assets from a directory on disk.
#[derive(Clone, Debug)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Resolve registry paths relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, file_path: &str) -> SceneResult<Vec<u8>> {
        let rel = normalize_rel_path(file_path)?;
        let path = self.root.join(&rel);
        let bytes =
            std::fs::read(&path).with_context(|| format!("read asset '{}'", path.display()))?;
        Ok(bytes)
    }
}

/// Normalize a registry-relative path.
///
/// The result uses `/` separators and drops `.` segments. Absolute paths and `..` are rejected.
pub(crate) fn normalize_rel_path(source: &str) -> SceneResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(SceneError::asset("asset path must be non-empty"));
    }
    if s.starts_with('/') || s.as_bytes().get(1) == Some(&b':') {
        return Err(SceneError::asset(format!(
            "asset path '{source}' must be relative"
        )));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(SceneError::asset(format!(
                    "asset path '{source}' must not contain '..'"
                )));
            }
            _ => out.push(part),
        }
    }

    if out.is_empty() {
        return Err(SceneError::asset("asset path must contain a file name"));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
