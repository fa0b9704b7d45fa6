use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::grid::GridIndex;
use crate::serialize::SerializedGrid;

/// Key holding the serialized grid.
pub const GRID_BLOB_KEY: &str = "fog-grid";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("stored grid is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),
}

/// Key-value store for opaque blobs.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Deleting a missing key succeeds.
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a temporary file and renames it over the old blob, so a
    /// failed write leaves the previous contents intact.
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote blob");
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key);
        Ok(())
    }
}

/// Loads the persisted grid, or an empty one if nothing was stored yet.
pub fn load_grid(store: &dyn BlobStore) -> Result<GridIndex, StoreError> {
    let Some(bytes) = store.get(GRID_BLOB_KEY)? else {
        info!("No stored grid, starting empty");
        return Ok(GridIndex::create_empty());
    };
    let data: SerializedGrid = serde_json::from_slice(&bytes)?;
    Ok(GridIndex::from_serializable(data))
}

pub fn persist_grid(store: &mut dyn BlobStore, grid: &GridIndex) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(&grid.to_serializable())?;
    store.put(GRID_BLOB_KEY, &bytes)?;

    let stats = grid.get_statistics();
    info!(
        files = grid.files().len(),
        points = stats.points_count,
        edges = stats.edges_count,
        bytes = bytes.len(),
        "Persisted grid"
    );
    Ok(())
}

pub fn clear_grid(store: &mut dyn BlobStore) -> Result<(), StoreError> {
    store.delete(GRID_BLOB_KEY)?;
    info!("Cleared stored grid");
    Ok(())
}
