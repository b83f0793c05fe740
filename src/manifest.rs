//! Persistent content-addressed cache: a JSON index of per-file hashes,
//! models, and timestamps, saved atomically once per run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One persisted record for a previously generated file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sha256: String,
    pub model: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestData {
    #[serde(default)]
    files: HashMap<String, ManifestEntry>,
}

/// Loads and saves the manifest JSON file at a fixed path. Mutations are held
/// in memory until [`Manifest::save`] is called.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    data: ManifestData,
}

impl Manifest {
    /// Creates a manifest bound to `path`, with an empty in-memory mapping.
    /// Call [`Manifest::load`] to populate it from disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: ManifestData::default(),
        }
    }

    /// Loads the manifest from disk. A missing file yields an empty mapping;
    /// a parse failure is fatal.
    pub fn load(&mut self) -> Result<()> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(self.path.clone(), e)),
        };
        self.data = serde_json::from_str(&text)
            .map_err(|source| Error::ManifestParse { path: self.path.clone(), source })?;
        Ok(())
    }

    /// The stored SHA-256 for `rel_key`, if any entry exists.
    pub fn get_sha(&self, rel_key: &str) -> Option<&str> {
        self.data.files.get(rel_key).map(|e| e.sha256.as_str())
    }

    /// A cheap clone of every known sha256, keyed by relative path. Lets
    /// concurrent generation tasks check cache hits without sharing mutable
    /// access to the manifest itself, which is only mutated from the
    /// single-threaded fan-in loop.
    pub fn snapshot_shas(&self) -> HashMap<String, String> {
        self.data.files.iter().map(|(k, v)| (k.clone(), v.sha256.clone())).collect()
    }

    /// Records or replaces the entry for `rel_key`.
    pub fn set_entry(&mut self, rel_key: String, entry: ManifestEntry) {
        self.data.files.insert(rel_key, entry);
    }

    /// Writes the manifest to a sibling temporary file, then atomically
    /// renames it over the target path, so readers never observe a partial
    /// write.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let body = serde_json::to_string_pretty(&self.data)
            .map_err(|source| Error::ManifestParse { path: self.path.clone(), source })?;
        std::fs::write(&tmp_path, body).map_err(|e| Error::io(tmp_path.clone(), e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| Error::io(self.path.clone(), e))?;
        Ok(())
    }

    /// The path this manifest is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manifest = Manifest::new(dir.path().join("manifest.json"));
        manifest.load().expect("load");
        assert_eq!(manifest.get_sha("a.ts"), None);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state/manifest.json");

        let mut manifest = Manifest::new(&path);
        manifest.set_entry(
            "a.ts".to_string(),
            ManifestEntry {
                sha256: "abc123".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                updated_at: "2026-07-27T00:00:00+00:00".to_string(),
            },
        );
        manifest.save().expect("save");

        let mut reloaded = Manifest::new(&path);
        reloaded.load().expect("load");
        assert_eq!(reloaded.get_sha("a.ts"), Some("abc123"));
    }

    #[test]
    fn corrupt_file_is_a_fatal_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").expect("write");

        let mut manifest = Manifest::new(&path);
        assert!(manifest.load().is_err());
    }

    #[test]
    fn save_uses_a_temp_file_and_rename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        let manifest = Manifest::new(&path);
        manifest.save().expect("save");
        assert!(path.exists());
        assert!(!dir.path().join("manifest.tmp").exists());
    }
}
