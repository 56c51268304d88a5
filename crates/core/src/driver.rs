//! Sequential batch loop: enumerate, filter, transcode, decide, notify.
//!
//! One file's failure never aborts the batch; every per-file error is
//! logged at the processing boundary and the loop moves on. Only argument
//! and configuration problems before any file is touched are fatal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::TranscoderConfig;
use crate::decision;
use crate::error::FileError;
use crate::ffprobe;
use crate::notify::{NotificationSink, ResultKind};
use crate::sentinel;
use crate::session::{self, SessionOutcome};

/// Why a candidate was skipped without starting a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension not in the configured allow-list
    Extension,
    /// Processed marker already present
    AlreadyProcessed,
    /// Temp output already present: either a concurrent run owns the file
    /// or a prior run died mid-transcode. Both cases skip; a partial
    /// output is never resumed.
    InProgress,
}

/// Result of the pre-session checks for one candidate
#[derive(Debug)]
pub enum Preflight {
    Skip(SkipReason),
    Ready {
        canonical_output: PathBuf,
        temp_output: PathBuf,
    },
}

/// Expand each argument as a glob pattern. Non-matching patterns yield
/// zero files without error; a malformed pattern is a configuration error.
pub fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let entries = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;

        let mut count = 0usize;
        for entry in entries {
            match entry {
                Ok(path) => {
                    files.push(path);
                    count += 1;
                }
                Err(e) => warn!("Error reading glob entry: {}", e),
            }
        }
        debug!("Found {}: {}", pattern, count);
    }

    Ok(files)
}

/// Run the filter and sentinel checks for one candidate. No subprocess is
/// spawned and no file content is read here.
pub fn preflight(cfg: &TranscoderConfig, path: &Path) -> Result<Preflight, FileError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e));

    let allowed = ext
        .as_deref()
        .map_or(false, |e| cfg.extensions.iter().any(|allowed| allowed == e));
    if !allowed {
        return Ok(Preflight::Skip(SkipReason::Extension));
    }

    let canonical_output = sentinel::canonical_output_path(path);

    if sentinel::is_processed(&canonical_output)? {
        return Ok(Preflight::Skip(SkipReason::AlreadyProcessed));
    }

    if sentinel::is_in_progress(path)? {
        return Ok(Preflight::Skip(SkipReason::InProgress));
    }

    Ok(Preflight::Ready {
        canonical_output,
        temp_output: sentinel::temp_output_path(path),
    })
}

/// One full pass over a ready candidate: probe, transcode, decide, notify
async fn process_file(
    cfg: &TranscoderConfig,
    path: &Path,
    canonical_output: &Path,
    temp_output: &Path,
    token: &CancelToken,
    notifier: &dyn NotificationSink,
) -> Result<(), FileError> {
    info!("Transcoding: {}", path.display());

    let metadata = ffprobe::probe_file(cfg, path)
        .await
        .map_err(|e| FileError::MetadataRead {
            path: path.to_path_buf(),
            cause: e,
        })?;
    let original_bytes = metadata.format.size_bytes();

    let outcome = match session::run(cfg, path, temp_output, original_bytes, token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // a failed encode leaves no usable temp output behind
            match std::fs::remove_file(temp_output) {
                Ok(()) => {}
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => warn!("Error deleting {}: {}", temp_output.display(), rm),
            }
            return Err(e);
        }
    };

    // A user-requested interrupt ends the file as an error, with no marker
    // and no destructive rename. The session already stopped the encoder.
    if token.is_cancelled() {
        if let SessionOutcome::Killed { .. } = outcome {
            match decision::finalize_killed(path, temp_output, original_bytes, None) {
                Ok(_) => {}
                Err(e) => warn!("{}", e),
            }
        }
        notifier.notify_end(None, None, ResultKind::Error);
        return Ok(());
    }

    sentinel::mark_processed(canonical_output)?;

    match outcome {
        SessionOutcome::Killed { last_report } => {
            if let Some((kind, report)) =
                decision::finalize_killed(path, temp_output, original_bytes, last_report)?
            {
                notifier.notify_end(None, Some(&report), kind);
            }
        }
        SessionOutcome::Completed => {
            // the report is stale once the encoder exited; re-read the output
            let result_meta = ffprobe::probe_file(cfg, temp_output)
                .await
                .map_err(|e| FileError::MetadataRead {
                    path: temp_output.to_path_buf(),
                    cause: e,
                })?;

            let kind = decision::finalize_completed(
                cfg,
                path,
                temp_output,
                canonical_output,
                original_bytes,
                &result_meta,
            )?;
            notifier.notify_end(Some(&result_meta), None, kind);
        }
    }

    Ok(())
}

/// Drive one batch over the expanded candidate list, strictly sequentially
pub async fn run_batch(
    cfg: &TranscoderConfig,
    patterns: &[String],
    token: &CancelToken,
    notifier: &dyn NotificationSink,
) -> Result<()> {
    let files = expand_paths(patterns)?;
    info!("Found {} file(s) to consider", files.len());

    for path in &files {
        if token.is_cancelled() {
            warn!("Termination requested, stopping batch");
            break;
        }

        let (canonical_output, temp_output) = match preflight(cfg, path) {
            Ok(Preflight::Skip(SkipReason::Extension)) => {
                debug!("Skipping {}: extension not in allow-list", path.display());
                continue;
            }
            Ok(Preflight::Skip(SkipReason::AlreadyProcessed)) => {
                debug!("File already processed: {}", path.display());
                continue;
            }
            Ok(Preflight::Skip(SkipReason::InProgress)) => {
                warn!("File is already being transcoded: {}", path.display());
                continue;
            }
            Ok(Preflight::Ready {
                canonical_output,
                temp_output,
            }) => (canonical_output, temp_output),
            Err(e) => {
                error!("{}", e);
                continue;
            }
        };

        if let Err(e) =
            process_file(cfg, path, &canonical_output, &temp_output, token, notifier).await
        {
            error!("{}", e);
        }
    }

    Ok(())
}
