//! Persisted Structure records with optimistic concurrency.
//!
//! The reconciler only ever writes status. Every write must carry the
//! `resource_version` it read; a stale version is rejected with
//! [`StoreError::Conflict`] and the caller re-reads on its next pass.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use t3kton_types::{validate_config_names, Structure, ValidationErrors};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Structure '{name}' changed underneath us (expected version {expected}, found {found})")]
    Conflict {
        name: String,
        expected: u64,
        found: u64,
    },

    #[error("Structure '{0}' not found")]
    NotFound(String),

    #[error("Invalid structure '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: ValidationErrors,
    },

    #[error("Store I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[async_trait]
pub trait StructureStore: Send + Sync {
    /// Returns the stored Structure, or `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<Structure>, StoreError>;

    /// Replaces the stored status with `structure.status`.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored version differs
    /// from `structure.metadata.resource_version`. Returns the stored record
    /// with its new version.
    async fn update_status(&self, structure: &Structure) -> Result<Structure, StoreError>;

    /// Creates or replaces the declared spec. An existing status is kept.
    async fn put(&self, structure: Structure) -> Result<Structure, StoreError>;
}

fn check_names(structure: &Structure) -> Result<(), StoreError> {
    match &structure.spec.config_values {
        Some(values) => validate_config_names("spec.configValues", values).map_err(|source| {
            StoreError::Invalid {
                name: structure.name().to_string(),
                source,
            }
        }),
        None => Ok(()),
    }
}

/// Applies a status write to `records`, enforcing the version check.
fn apply_status(
    records: &mut BTreeMap<String, Structure>,
    structure: &Structure,
) -> Result<Structure, StoreError> {
    let name = structure.name();
    let stored = records
        .get_mut(name)
        .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

    if stored.metadata.resource_version != structure.metadata.resource_version {
        return Err(StoreError::Conflict {
            name: name.to_string(),
            expected: structure.metadata.resource_version,
            found: stored.metadata.resource_version,
        });
    }

    stored.status = structure.status.clone();
    stored.metadata.resource_version += 1;
    Ok(stored.clone())
}

/// Applies a spec write to `records`.
fn apply_put(records: &mut BTreeMap<String, Structure>, mut structure: Structure) -> Structure {
    match records.get_mut(structure.name()) {
        Some(stored) => {
            stored.spec = structure.spec;
            stored.metadata.resource_version += 1;
            stored.clone()
        }
        None => {
            structure.metadata.resource_version = 1;
            records.insert(structure.name().to_string(), structure.clone());
            structure
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, Structure>,
    conflict_next: bool,
    status_writes: usize,
}

/// Structure store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStructureStore {
    state: Mutex<MemoryState>,
}

impl MemoryStructureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `structure` verbatim, status and version included.
    pub fn insert(&self, structure: Structure) {
        self.state
            .lock()
            .records
            .insert(structure.name().to_string(), structure);
    }

    /// Makes the next status write fail as if another writer got there first.
    pub fn conflict_next_update(&self) {
        self.state.lock().conflict_next = true;
    }

    /// Number of successful status writes.
    pub fn status_writes(&self) -> usize {
        self.state.lock().status_writes
    }

    pub fn snapshot(&self, name: &str) -> Option<Structure> {
        self.state.lock().records.get(name).cloned()
    }
}

#[async_trait]
impl StructureStore for MemoryStructureStore {
    async fn get(&self, name: &str) -> Result<Option<Structure>, StoreError> {
        Ok(self.snapshot(name))
    }

    async fn update_status(&self, structure: &Structure) -> Result<Structure, StoreError> {
        let mut state = self.state.lock();

        if std::mem::take(&mut state.conflict_next) {
            let found = structure.metadata.resource_version + 1;
            return Err(StoreError::Conflict {
                name: structure.name().to_string(),
                expected: structure.metadata.resource_version,
                found,
            });
        }

        let stored = apply_status(&mut state.records, structure)?;
        state.status_writes += 1;
        Ok(stored)
    }

    async fn put(&self, structure: Structure) -> Result<Structure, StoreError> {
        check_names(&structure)?;
        Ok(apply_put(&mut self.state.lock().records, structure))
    }
}

/// One YAML manifest per Structure under a directory.
///
/// Manifests are named `<name>.yaml`. Config value names are validated on
/// every load, so a hand-edited manifest with a bad name never reaches the
/// reconciler.
#[derive(Debug)]
pub struct FileStructureStore {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl FileStructureStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let safe = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !safe {
            return Err(StoreError::backend(format!(
                "'{name}' is not a valid structure name"
            )));
        }
        Ok(self.directory.join(format!("{name}.yaml")))
    }

    fn read(&self, name: &str) -> Result<Option<Structure>, StoreError> {
        let path = self.path_for(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut structure: Structure =
            serde_yaml::from_str(&content).map_err(|e| StoreError::Manifest {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if structure.metadata.name.is_empty() {
            structure.metadata.name = name.to_string();
        }
        check_names(&structure)?;
        Ok(Some(structure))
    }

    fn write(&self, structure: &Structure) -> Result<(), StoreError> {
        let path = self.path_for(structure.name())?;
        let content = serde_yaml::to_string(structure).map_err(|e| StoreError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;

        // Write-then-rename so readers never see a half-written manifest.
        let staging = path.with_extension("yaml.tmp");
        fs::write(&staging, content).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })?;
        debug!(structure = %structure.name(), version = structure.metadata.resource_version, "Wrote manifest");
        Ok(())
    }
}

#[async_trait]
impl StructureStore for FileStructureStore {
    async fn get(&self, name: &str) -> Result<Option<Structure>, StoreError> {
        let _guard = self.lock.lock();
        self.read(name)
    }

    async fn update_status(&self, structure: &Structure) -> Result<Structure, StoreError> {
        let _guard = self.lock.lock();

        let name = structure.name().to_string();
        let mut records = BTreeMap::new();
        if let Some(stored) = self.read(&name)? {
            records.insert(name.clone(), stored);
        }

        let stored = apply_status(&mut records, structure)?;
        self.write(&stored)?;
        Ok(stored)
    }

    async fn put(&self, structure: Structure) -> Result<Structure, StoreError> {
        check_names(&structure)?;
        let _guard = self.lock.lock();

        let mut records = BTreeMap::new();
        if let Some(stored) = self.read(structure.name())? {
            records.insert(stored.name().to_string(), stored);
        }

        let stored = apply_put(&mut records, structure);
        self.write(&stored)?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use t3kton_types::{ConfigValues, StructureSpec};

    fn spec() -> StructureSpec {
        StructureSpec {
            id: 42,
            state: "built".to_string(),
            blueprint: "base".to_string(),
            config_values: None,
        }
    }

    #[tokio::test]
    async fn test_memory_versioning() {
        let store = MemoryStructureStore::new();
        let created = store.put(Structure::new("web01", spec())).await.unwrap();
        assert_eq!(created.metadata.resource_version, 1);

        let mut update = created.clone();
        update.status.state = "planned".to_string();
        let stored = store.update_status(&update).await.unwrap();
        assert_eq!(stored.metadata.resource_version, 2);
        assert_eq!(stored.status.state, "planned");

        // Reusing the old version is a conflict.
        let err = store.update_status(&update).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_memory_put_keeps_status() {
        let store = MemoryStructureStore::new();
        let mut structure = Structure::new("web01", spec());
        structure.status.hostname = "web01".to_string();
        structure.metadata.resource_version = 5;
        store.insert(structure);

        let mut changed = Structure::new("web01", spec());
        changed.spec.state = "planned".to_string();
        let stored = store.put(changed).await.unwrap();

        assert_eq!(stored.metadata.resource_version, 6);
        assert_eq!(stored.spec.state, "planned");
        assert_eq!(stored.status.hostname, "web01");
    }

    #[tokio::test]
    async fn test_memory_injected_conflict() {
        let store = MemoryStructureStore::new();
        let created = store.put(Structure::new("web01", spec())).await.unwrap();

        store.conflict_next_update();
        assert!(store.update_status(&created).await.unwrap_err().is_conflict());
        assert!(store.update_status(&created).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_structure() {
        let store = MemoryStructureStore::new();
        let err = store
            .update_status(&Structure::new("ghost", spec()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_put_rejects_bad_config_names() {
        let store = MemoryStructureStore::new();
        let mut values = ConfigValues::new();
        values.insert("a:>test", 1i64);
        let mut structure = Structure::new("web01", spec());
        structure.spec.config_values = Some(values);

        let err = store.put(structure).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStructureStore::new(dir.path());

        assert!(store.get("web01").await.unwrap().is_none());

        let created = store.put(Structure::new("web01", spec())).await.unwrap();
        let mut update = created.clone();
        update.status.state = "planned".to_string();
        store.update_status(&update).await.unwrap();

        let loaded = store.get("web01").await.unwrap().unwrap();
        assert_eq!(loaded.metadata.resource_version, 2);
        assert_eq!(loaded.status.state, "planned");
        assert_eq!(loaded.spec, spec());

        assert!(store.update_status(&update).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_file_store_validates_on_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("web01.yaml"),
            "metadata:\n  name: web01\nspec:\n  id: 1\n  configValues:\n    \"a:>test\": 1\n",
        )
        .unwrap();

        let store = FileStructureStore::new(dir.path());
        let err = store.get("web01").await.unwrap_err();
        assert!(err.to_string().contains("a:>test"));
    }

    #[tokio::test]
    async fn test_file_store_name_from_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("db01.yaml"),
            "metadata:\n  name: \"\"\nspec:\n  id: 3\n",
        )
        .unwrap();

        let store = FileStructureStore::new(dir.path());
        let loaded = store.get("db01").await.unwrap().unwrap();
        assert_eq!(loaded.name(), "db01");
        assert!(store.get("../etc/passwd").await.is_err());
    }
}
