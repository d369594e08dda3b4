//! Applied-snapshot persistence.
//!
//! The state file exists for exactly one purpose: when the sidecar restarts
//! against an unchanged fleet while the proxy keeps running, the first tick
//! must not trigger a spurious reload. The file is therefore only trusted
//! within a short freshness window; anything older must never mask real
//! change and is ignored.

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::proxy::backend::Snapshot;

/// Freshness window for adopting persisted state at startup.
pub const STATE_TTL: Duration = Duration::from_millis(2000);

/// Error type for state persistence.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads and writes the applied snapshot at a fixed path.
pub struct StateStore {
    path: String,
}

impl StateStore {
    /// Returns `None` when the path is empty: persistence disabled.
    pub fn new(path: &str) -> Option<Self> {
        if path.is_empty() {
            None
        } else {
            Some(Self { path: path.to_string() })
        }
    }

    /// Persist the applied snapshot. Called after every successful effector
    /// pass; the file mtime doubles as the freshness timestamp.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let data = serde_json::to_vec(snapshot)?;
        std::fs::write(&self.path, data)?;
        std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o644))?;
        Ok(())
    }

    /// Load the persisted snapshot if it is fresh enough to trust.
    ///
    /// `Ok(None)` means "start empty": the file is missing or expired.
    pub fn load(&self) -> Result<Option<Snapshot>, StateError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path, "State file does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let modified = metadata.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > STATE_TTL {
            tracing::debug!(path = %self.path, age_ms = age.as_millis() as u64, "State file exists but is expired");
            return Ok(None);
        }

        let bytes = std::fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
