//! Best-effort audit files written during a run.
//!
//! Snapshot failures never affect the run; they are logged and dropped.

use serde::Serialize;
use std::path::Path;

/// Overwrite `path` with `content`, creating parent directories.
///
/// Returns `true` if the file was written.
pub fn write_text(path: &Path, content: &str) -> bool {
    match write(path, content.as_bytes()) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), bytes = content.len(), "Snapshot written");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write snapshot");
            false
        }
    }
}

/// Overwrite `path` with `value` as pretty-printed JSON.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_text(path, &json),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to serialize snapshot");
            false
        }
    }
}

fn write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}
