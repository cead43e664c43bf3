//! Content-addressed artifact storage.
//!
//! Artifacts live at `<root>/<site_id>/<call_slug>/<stem>_<hash8><ext>`.
//! The in-memory hash index maps a payload's SHA-256 to the relative path
//! already holding it, so identical content is stored once no matter how
//! many records or URLs point at it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::DocumentError;
use super::filename::{resolve_unique_path, sanitize_filename, sanitize_filename_component};
use crate::utils::{sha256_hex, write_atomic};

/// Outcome of [`ArtifactStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Path relative to the store root.
    pub relative_path: PathBuf,
    /// True when an existing artifact with the same hash was reused.
    pub reused: bool,
}

/// On-disk artifact directory plus the content-hash index.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    by_hash: HashMap<String, PathBuf>,
}

impl ArtifactStore {
    /// Creates a store rooted at `root` with an empty index.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            by_hash: HashMap::new(),
        }
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed hashes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Seeds the index from previously persisted `(content_hash, relative_path)` pairs.
    ///
    /// Entries whose file no longer exists are skipped. Returns how many were indexed.
    pub fn seed<'a, I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, &'a Path)>,
    {
        let mut seeded = 0;
        for (hash, relative) in entries {
            if hash.is_empty() || self.by_hash.contains_key(hash) {
                continue;
            }
            if self.root.join(relative).is_file() {
                self.by_hash.insert(hash.to_string(), relative.to_path_buf());
                seeded += 1;
            } else {
                debug!(hash, path = %relative.display(), "indexed artifact missing on disk; not seeding");
            }
        }
        seeded
    }

    /// Relative path of an artifact with this content hash, if any.
    #[must_use]
    pub fn lookup(&self, content_hash: &str) -> Option<&Path> {
        self.by_hash.get(content_hash).map(PathBuf::as_path)
    }

    /// Stores `bytes` under `<site_id>/<call_slug>/<file_name>`, reusing an
    /// existing artifact when `content_hash` is already indexed.
    ///
    /// `content_hash` identifies the payload as downloaded; `bytes` may be a
    /// normalized rendition of it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] if the directory or file cannot be written.
    pub fn store(
        &mut self,
        site_id: &str,
        call_slug: &str,
        file_name: &str,
        content_hash: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact, DocumentError> {
        if let Some(existing) = self.lookup(content_hash) {
            return Ok(StoredArtifact {
                relative_path: existing.to_path_buf(),
                reused: true,
            });
        }

        let site_dir = non_empty_component(site_id, "site");
        let call_dir = non_empty_component(call_slug, "call");
        let relative_dir = PathBuf::from(&site_dir).join(&call_dir);
        let absolute_dir = self.root.join(&relative_dir);
        std::fs::create_dir_all(&absolute_dir).map_err(|e| DocumentError::io(&absolute_dir, e))?;

        let file_name = sanitize_filename(file_name);
        let mut target = absolute_dir.join(&file_name);
        if target.exists() && !same_content(&target, bytes) {
            warn!(path = %target.display(), "artifact name taken by different content; adding suffix");
            target = resolve_unique_path(&absolute_dir, &file_name);
        }
        if !target.exists() {
            write_atomic(&target, bytes).map_err(|e| DocumentError::io(&target, e))?;
        }

        let stored_name = target
            .file_name()
            .map_or_else(|| PathBuf::from(&file_name), PathBuf::from);
        let relative_path = relative_dir.join(stored_name);
        self.by_hash
            .insert(content_hash.to_string(), relative_path.clone());
        Ok(StoredArtifact {
            relative_path,
            reused: false,
        })
    }
}

fn non_empty_component(value: &str, fallback: &str) -> String {
    let cleaned = sanitize_filename_component(value);
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn same_content(path: &Path, bytes: &[u8]) -> bool {
    std::fs::read(path).is_ok_and(|existing| sha256_hex(&existing) == sha256_hex(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_store_writes_under_site_and_call() {
        let dir = TempDir::new().unwrap();
        let mut store = ArtifactStore::new(dir.path());
        let stored = store
            .store("fct", "FCT-2025-01", "aviso_abcd1234.pdf", "abcd1234ff", b"%PDF-1.7")
            .unwrap();
        assert!(!stored.reused);
        assert_eq!(
            stored.relative_path,
            PathBuf::from("fct/FCT-2025-01/aviso_abcd1234.pdf")
        );
        assert_eq!(std::fs::read(dir.path().join(&stored.relative_path)).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_same_hash_reuses_first_path() {
        let dir = TempDir::new().unwrap();
        let mut store = ArtifactStore::new(dir.path());
        let first = store.store("fct", "a", "x_11111111.pdf", "h1", b"%PDF-1").unwrap();
        let second = store.store("fct", "b", "y_11111111.pdf", "h1", b"%PDF-1").unwrap();
        assert!(second.reused);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(!dir.path().join("fct/b").exists());
    }

    #[test]
    fn test_name_collision_with_other_content_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let mut store = ArtifactStore::new(dir.path());
        store.store("fct", "a", "x.pdf", "h1", b"one").unwrap();
        let other = store.store("fct", "a", "x.pdf", "h2", b"two").unwrap();
        assert_eq!(other.relative_path, PathBuf::from("fct/a/x_2.pdf"));
    }

    #[test]
    fn test_seed_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("fct/a")).unwrap();
        std::fs::write(dir.path().join("fct/a/kept.pdf"), b"%PDF").unwrap();
        let mut store = ArtifactStore::new(dir.path());
        let kept = PathBuf::from("fct/a/kept.pdf");
        let gone = PathBuf::from("fct/a/gone.pdf");
        let seeded = store.seed([("h-kept", kept.as_path()), ("h-gone", gone.as_path())]);
        assert_eq!(seeded, 1);
        assert_eq!(store.lookup("h-kept"), Some(kept.as_path()));
        assert!(store.lookup("h-gone").is_none());
    }

    #[test]
    fn test_empty_slug_components_fall_back() {
        let dir = TempDir::new().unwrap();
        let mut store = ArtifactStore::new(dir.path());
        let stored = store.store("", "../..", "a.pdf", "h", b"%PDF").unwrap();
        assert_eq!(stored.relative_path, PathBuf::from("site/call/a.pdf"));
    }
}
