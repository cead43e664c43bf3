//! Catalog persistence as a pretty-printed JSON array.
//!
//! The file is read fully before a run and replaced atomically after
//! consolidation; a crash mid-run leaves the previous catalog intact.

use std::path::Path;

use tracing::{info, warn};

use super::consolidate::Catalog;
use super::error::CatalogError;
use super::record::CallRecord;
use crate::utils::write_atomic;

/// Loads the catalog at `path`. A missing file is an empty catalog.
///
/// # Errors
///
/// Returns [`CatalogError`] when the file exists but cannot be read or parsed.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no catalog yet; starting empty");
            return Ok(Catalog::new());
        }
        Err(e) => return Err(CatalogError::read(path, e)),
    };
    if content.trim().is_empty() {
        return Err(CatalogError::corrupt(path, "file is empty"));
    }
    let records: Vec<CallRecord> =
        serde_json::from_str(&content).map_err(|e| CatalogError::corrupt(path, e.to_string()))?;
    let stored = records.len();
    let catalog = Catalog::from_records(records);
    if catalog.len() != stored {
        warn!(
            path = %path.display(),
            stored,
            unique = catalog.len(),
            "catalog contained duplicate identity keys; collapsed"
        );
    }
    info!(path = %path.display(), records = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Writes `catalog` to `path` atomically.
///
/// # Errors
///
/// Returns [`CatalogError`] if serialization or the write fails.
pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<(), CatalogError> {
    let mut json = serde_json::to_vec_pretty(catalog.records())
        .map_err(|source| CatalogError::Serialize { source })?;
    json.push(b'\n');
    write_atomic(path, &json).map_err(|e| CatalogError::write(path, e))?;
    info!(path = %path.display(), records = catalog.len(), "catalog written");
    Ok(())
}
