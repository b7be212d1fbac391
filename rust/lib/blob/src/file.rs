use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::BlobError;
use crate::traits::BlobStore;

/// FileStore is a BlobStore implementation backed by the local filesystem.
///
/// Keys are mapped to paths under `base_dir`:
///   key "photos/ab12" → `{base_dir}/photos/ab12`
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written photo.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new FileStore rooted at `base_dir`.
    /// The directory is created if it doesn't exist.
    pub fn open(base_dir: &Path) -> Result<Self, BlobError> {
        fs::create_dir_all(base_dir).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Resolve a key to a filesystem path. Rejects keys that could escape base_dir.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        if key.is_empty() {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        let rel = Path::new(key);
        let clean = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(rel))
    }
}

/// Write `tmp` with `fill`, sync it and rename it over `path`. On any
/// failure the temporary file is removed.
fn replace_via_temp(
    tmp: &Path,
    path: &Path,
    fill: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> Result<(), BlobError> {
    let result = fs::File::create(tmp)
        .and_then(|mut file| {
            fill(&mut file)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(tmp, path));
    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(tmp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!("cannot remove {}: {}", tmp.display(), cleanup);
            }
        }
        return Err(BlobError::Io(e.to_string()));
    }
    Ok(())
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobError::Io(e.to_string()))?;
        }

        let tmp = path.with_extension("partial");
        replace_via_temp(&tmp, &path, |file| file.write_all(data))?;

        debug!("stored blob {} ({} bytes)", key, data.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Some(data))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        }
        Ok(())
    }
}
