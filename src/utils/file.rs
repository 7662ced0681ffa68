use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Context, Result};

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `contents` to a sibling temp file and rename it over `path`.
///
/// The target is either the old file or the complete new one; a failure
/// before the rename leaves it untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let temp = temp_path_for(path);
    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&temp)
            .with_context(|| format!("Failed to create {}", temp.display()))?;
        file.write_all(contents)
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {}", temp.display()))?;
        fs::rename(&temp, path).with_context(|| {
            format!("Failed to move {} over {}", temp.display(), path.display())
        })?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}
