use crate::core::error::ObservationError;
use crate::core::source::SnapshotSource;
use crate::core::types::Snapshot;
use std::path::{Path, PathBuf};

/// Reads a JSON snapshot from disk on every capture
///
/// The file holds one [`Snapshot`] object:
///
/// ```json
/// {"threads": [{"id": 1, "held": [10], "waiting_for": 11, "stack": ["main"]}]}
/// ```
///
/// A missing file or malformed JSON is an observation failure for that
/// sample only; the next capture tries again.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn capture(&mut self) -> Result<Snapshot, ObservationError> {
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
