//! Preferences persisted across runs as a small JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Refusal returned while the legal notice is unaccepted.
#[derive(Debug, Error)]
#[error("the legal notice has not been accepted; run `presale accept-disclaimer` first")]
pub struct DisclaimerRequired;

/// Durable user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// The user acknowledged the legal notice. Purchases are refused
    /// until this is set.
    pub disclaimer_accepted: bool,
    /// Reconnect the last wallet automatically on startup.
    pub auto_reconnect: bool,
}

impl Preferences {
    /// Load preferences from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Purchase gate: entry points refuse until the notice is accepted.
    pub fn require_disclaimer(&self) -> Result<(), DisclaimerRequired> {
        if self.disclaimer_accepted {
            Ok(())
        } else {
            Err(DisclaimerRequired)
        }
    }

    /// Persist preferences to `path`.
    ///
    /// Writes to a sibling temp file and renames it into place so a
    /// crash mid-write never leaves a truncated file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp: PathBuf = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "Preferences saved");
        Ok(())
    }
}
