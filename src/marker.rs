//! Persisted "last downloaded asset id" markers and the download gate.
//!
//! Each download gets its own marker file, keyed by repository and pattern,
//! so two downloads never overwrite each other's marker.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Outcome of comparing a marker with a candidate asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Skip,
    Download,
}

/// Skip iff the marker exists and names the same asset.
pub fn decide(marker: Option<u64>, asset_id: u64) -> Gate {
    match marker {
        Some(id) if id == asset_id => Gate::Skip,
        _ => Gate::Download,
    }
}

/// Directory holding the marker files.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    /// Store keeping its marker files in `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/.ghfetch-<key>.id`, key = first 16 hex chars of
    /// SHA-256(`repo` + "\n" + `pattern`).
    pub fn path_for(&self, repo: &str, pattern: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(repo.as_bytes());
        hasher.update(b"\n");
        hasher.update(pattern.as_bytes());
        let key = hex::encode(hasher.finalize());
        self.dir.join(format!(".ghfetch-{}.id", &key[..16]))
    }

    /// Absent or unreadable-as-a-number markers both mean "never downloaded".
    pub async fn read(&self, path: &Path) -> Result<Option<u64>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        match raw.trim().parse::<u64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                log::warn!("ignoring marker {} with unexpected contents {raw:?}", path.display());
                Ok(None)
            }
        }
    }

    /// Create or truncate the marker and store `asset_id` in decimal.
    pub async fn write(&self, path: &Path, asset_id: u64) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        tokio::fs::write(path, asset_id.to_string())
            .await
            .map_err(|e| Error::io(path, e))
    }
}
