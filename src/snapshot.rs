//! Persistence for the previous run's product snapshot.
//!
//! Persistence failures never abort a run: a missing or corrupt state file
//! is treated as empty history, and an unwritable primary path degrades to
//! a scratch-location write with a best-effort copy back.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::models::Snapshot;

/// Loads and saves the snapshot JSON file.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the previous snapshot. Missing file or parse errors yield an
    /// empty snapshot.
    pub fn load(&self) -> Snapshot {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no previous snapshot at {}", self.path.display());
                return Snapshot::new();
            }
            Err(e) => {
                warn!("could not read {}: {}", self.path.display(), e);
                return Snapshot::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "corrupt snapshot at {}, starting with empty history: {}",
                    self.path.display(),
                    e
                );
                Snapshot::new()
            }
        }
    }

    /// Persist the current snapshot, overwriting prior state. Returns false
    /// on failure; the caller carries on either way.
    pub fn save(&self, snapshot: &Snapshot) -> bool {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!("could not serialize snapshot: {}", e);
                return false;
            }
        };
        safe_write(&self.path, &json)
    }
}

/// Write `content` to `path`, falling back to the system temp directory on
/// IO or permission errors with a best-effort copy back to the primary path.
///
/// Also used for the HTML report and raw-markup debug dumps.
pub fn safe_write(path: &Path, content: &str) -> bool {
    match std::fs::write(path, content) {
        Ok(()) => {
            info!("wrote {}", path.display());
            true
        }
        Err(e) => {
            error!("could not write {}: {}", path.display(), e);
            let Some(file_name) = path.file_name() else {
                return false;
            };
            let fallback = std::env::temp_dir().join(file_name);
            if let Err(e) = std::fs::write(&fallback, content) {
                error!("fallback write to {} failed too: {}", fallback.display(), e);
                return false;
            }
            info!("wrote fallback copy to {}", fallback.display());
            match std::fs::copy(&fallback, path) {
                Ok(_) => {
                    info!("copied {} back to {}", fallback.display(), path.display());
                    true
                }
                Err(e) => {
                    error!("could not copy fallback back to primary: {}", e);
                    false
                }
            }
        }
    }
}
