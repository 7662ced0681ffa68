use std::path::{Path, PathBuf};

use crate::error::Result;

pub mod merge;
pub mod snapshot;

pub use merge::{merge, MergedRecords};
pub use snapshot::{load_previous, write_snapshot, Snapshot};

/// Facade over the single snapshot file that is both input and output of a run.
pub struct Records {
    snapshot_path: PathBuf,
}

impl Records {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn load_previous(&self) -> Snapshot {
        load_previous(&self.snapshot_path)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        write_snapshot(&self.snapshot_path, snapshot)
    }
}
