//! Filesystem markers that record another file's processing state.
//!
//! Two markers exist per logical output path: a hidden `.processed` file
//! that makes repeated runs idempotent, and a `.transcode-temp` file that
//! doubles as the in-progress output and as an advisory lock. A stale temp
//! file left by a crashed run makes the file skip rather than resume; a
//! partial output is never trusted.
//!
//! Marker existence is the entire signal; contents are never read. The
//! advisory lock has a race window between the existence check and the
//! session spawn (no create-exclusive guarantee is assumed), so two
//! concurrent runs over the same path are not fully excluded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use crate::error::FileError;

/// Suffix appended to the input path for the in-progress output
pub const TEMP_SUFFIX: &str = ".transcode-temp";

/// Canonical container extension applied when a transcode replaces the original
pub const CANONICAL_EXTENSION: &str = "mp4";

/// Canonical output path for an input: same directory and stem, `.mp4` extension
pub fn canonical_output_path(input: &Path) -> PathBuf {
    input.with_extension(CANONICAL_EXTENSION)
}

/// Path of the processed marker for an output: `dir/.name.mp4.processed`
pub fn processed_marker_path(output: &Path) -> PathBuf {
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    let base = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{}.processed", base))
}

/// Path of the temp output (and in-progress marker) for an input:
/// `name.ext.transcode-temp` alongside the input
pub fn temp_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn marker_exists(path: &Path) -> Result<bool, FileError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileError::Sentinel {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// True iff the processed marker exists for the given output path
pub fn is_processed(output: &Path) -> Result<bool, FileError> {
    marker_exists(&processed_marker_path(output))
}

/// True iff a temp output exists for the given input path
pub fn is_in_progress(input: &Path) -> Result<bool, FileError> {
    marker_exists(&temp_output_path(input))
}

/// Create the processed marker for the given output path. Idempotent.
pub fn mark_processed(output: &Path) -> Result<(), FileError> {
    let marker = processed_marker_path(output);
    fs::write(&marker, "").map_err(|e| FileError::Sentinel {
        path: marker.clone(),
        source: e,
    })
}
