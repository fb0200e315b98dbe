//! Pact persistence.
//!
//! [`FileAdapter`] keeps one pretty-printed JSON file per pact id inside a
//! folder. Saving overwrites the whole file, so the last write wins.

use crate::error::{PactError, Result};
use crate::pact::{Pact, PactId};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Storage boundary for pacts.
pub trait PactAdapter: Send + Sync {
    /// Every readable pact in storage. Unparsable entries are skipped.
    fn load_pacts(&self) -> Result<BTreeMap<PactId, Pact>>;

    /// `Ok(None)` when no pact with `id` is stored.
    fn load_pact(&self, id: &PactId) -> Result<Option<Pact>>;

    fn save_pact(&self, pact: &Pact) -> Result<()>;

    /// Deleting a pact that does not exist is not an error.
    fn delete_pact(&self, id: &PactId) -> Result<()>;

    /// Human readable storage location.
    fn folder(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileAdapter {
    folder: PathBuf,
}

impl FileAdapter {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.folder
    }

    fn file_for(&self, id: &PactId) -> PathBuf {
        self.folder.join(format!("{}.json", id.as_str()))
    }

    fn read(&self, id: &str, path: &Path) -> Result<Pact> {
        let contents =
            fs::read_to_string(path).map_err(|e| PactError::adapter_io("load", id, e))?;
        Pact::from_json_str(&contents)
    }
}

impl PactAdapter for FileAdapter {
    fn load_pacts(&self) -> Result<BTreeMap<PactId, Pact>> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Pact folder {:?} does not exist, no pacts loaded", self.folder);
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(PactError::adapter_io("list", self.folder(), e)),
        };

        let mut pacts = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| PactError::adapter_io("list", self.folder(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            match self.read(&name, &path) {
                Ok(pact) => {
                    pacts.insert(pact.id.clone(), pact);
                }
                Err(e) => warn!("Skipping pact file {:?}: {}", path, e),
            }
        }
        info!("Loaded {} pacts from {:?}", pacts.len(), self.folder);
        Ok(pacts)
    }

    fn load_pact(&self, id: &PactId) -> Result<Option<Pact>> {
        let path = self.file_for(id);
        if !path.exists() {
            debug!("No pact file for '{}' at {:?}", id, path);
            return Ok(None);
        }
        self.read(id.as_str(), &path).map(Some)
    }

    fn save_pact(&self, pact: &Pact) -> Result<()> {
        fs::create_dir_all(&self.folder)
            .map_err(|e| PactError::adapter_io("save", pact.id.as_str(), e))?;
        let json = serde_json::to_string_pretty(pact)
            .map_err(|e| PactError::malformed(pact.id.as_str(), e.to_string()))?;
        let path = self.file_for(&pact.id);
        fs::write(&path, json).map_err(|e| PactError::adapter_io("save", pact.id.as_str(), e))?;
        debug!("Saved pact '{}' ({} records) to {:?}", pact.id, pact.len(), path);
        Ok(())
    }

    fn delete_pact(&self, id: &PactId) -> Result<()> {
        match fs::remove_file(self.file_for(id)) {
            Ok(()) => {
                info!("Deleted pact '{}'", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PactError::adapter_io("delete", id.as_str(), e)),
        }
    }

    fn folder(&self) -> String {
        self.folder.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pact::{PactAuth, PactInfo, PactRecord, PactRequest, PactResponse};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_pact() -> Pact {
        let mut info = PactInfo::with_title(["Inventory", "create"]);
        info.tenant = Some("t100".into());
        info.base_url = Some("https://t100.example.com".into());
        let mut pact = Pact::new(PactId::from_title(&info.title), info);
        let mut request = PactRequest::new("POST", "/inventory/managedObjects");
        request.body = Some(json!({"name": "x"}));
        pact.append_record(
            PactRecord::new(
                request,
                PactResponse::new(201).with_body(json!({"id": "42", "name": "x"})),
            )
            .with_auth(PactAuth {
                user: Some("admin".into()),
                ..Default::default()
            }),
            false,
        );
        pact
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path().join("nested").join("pacts"));
        let pact = sample_pact();

        adapter.save_pact(&pact).unwrap();
        let loaded = adapter.load_pact(&pact.id).unwrap().unwrap();
        assert_eq!(loaded, pact);
        assert!(dir
            .path()
            .join("nested/pacts/Inventory__create.json")
            .exists());
    }

    #[test]
    fn test_load_missing_pact() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());
        assert!(adapter.load_pact(&PactId::new("nope")).unwrap().is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());
        let pact = sample_pact();
        adapter.save_pact(&pact).unwrap();
        adapter.delete_pact(&pact.id).unwrap();
        adapter.delete_pact(&pact.id).unwrap();
        assert!(adapter.load_pact(&pact.id).unwrap().is_none());
    }

    #[test]
    fn test_load_pacts_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());
        adapter.save_pact(&sample_pact()).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let pacts = adapter.load_pacts().unwrap();
        assert_eq!(pacts.len(), 1);
        assert!(pacts.contains_key(&PactId::new("Inventory__create")));
    }

    #[test]
    fn test_load_pacts_from_missing_folder() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path().join("missing"));
        assert!(adapter.load_pacts().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());
        fs::write(dir.path().join("bad.json"), r#"{"id": "bad", "records": []}"#).unwrap();
        let err = adapter.load_pact(&PactId::new("bad")).unwrap_err();
        assert!(matches!(err, PactError::MalformedPact { .. }));
    }
}
