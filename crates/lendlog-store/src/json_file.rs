//! Whole-file JSON maps with atomic replacement.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Load a `key -> value` JSON object.
///
/// A missing or blank file is an empty map; anything else that fails to
/// parse is an error, so a corrupt file is never silently overwritten.
pub fn load_map<T: DeserializeOwned>(path: &Path) -> StoreResult<BTreeMap<String, T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the file at `path` with `map`, via a temp file in the same
/// directory and a rename.
pub fn save_map<T: Serialize>(path: &Path, map: &BTreeMap<String, T>) -> StoreResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let bytes = serde_json::to_vec_pretty(map).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(&bytes).map_err(|e| StoreError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    debug!(path = %path.display(), entries = map.len(), "rewrote JSON store");
    Ok(())
}

/// Create `path` holding `{}` if it does not exist yet.
pub fn ensure_exists(path: &Path) -> StoreResult<()> {
    if path.exists() {
        return Ok(());
    }
    save_map::<serde_json::Value>(path, &BTreeMap::new())
}
