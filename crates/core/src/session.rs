//! One subprocess invocation of the encoder against one input/output pair.
//!
//! The session polls rather than blocking until exit so that cancellation
//! and progress logging both happen at a bounded cadence. A dedicated task
//! drains the `-progress` stream and keeps the latest complete snapshot;
//! the poll loop reads it, logs it, and decides whether to keep waiting.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use humansize::{format_size, DECIMAL};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;

use crate::cancel::CancelToken;
use crate::config::TranscoderConfig;
use crate::error::FileError;
use crate::progress::ProgressReport;

/// Terminal state of a session. A failed spawn or a non-zero encoder exit
/// is surfaced as a `FileError` instead.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The encoder exited on its own; the output file is authoritative,
    /// not the report.
    Completed,
    /// The encoder was stopped by us, either on cancellation or because the
    /// output already outgrew the original. The temp output is suspect.
    Killed { last_report: Option<ProgressReport> },
}

/// Full ffmpeg argument list: overwrite + input, the configured flag
/// template verbatim, then the progress plumbing and the temp output.
pub fn build_ffmpeg_args(flags: &str, input: &Path, temp_output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
    ];
    args.extend(flags.split_whitespace().map(str::to_string));
    args.push("-progress".to_string());
    args.push("pipe:1".to_string());
    args.push("-nostats".to_string());
    args.push(temp_output.to_string_lossy().into_owned());
    args
}

/// Run one encode of `input -> temp_output`, polling progress at the
/// configured interval and honoring the cancellation token at each tick.
///
/// `original_size` feeds the early-exit policy: with `keep_old` and
/// `early_exit` both enabled, the encode is stopped as soon as the reported
/// cumulative output size exceeds it, since the result would be discarded
/// anyway.
pub async fn run(
    cfg: &TranscoderConfig,
    input: &Path,
    temp_output: &Path,
    original_size: u64,
    token: &CancelToken,
) -> Result<SessionOutcome, FileError> {
    let args = build_ffmpeg_args(&cfg.flags, input, temp_output);
    debug!("Executing: {} {}", cfg.ffmpeg_bin.display(), args.join(" "));

    let mut cmd = Command::new(&cfg.ffmpeg_bin);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if cfg.stderr { Stdio::inherit() } else { Stdio::null() })
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| FileError::Spawn {
        path: input.to_path_buf(),
        source: e,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| FileError::ProgressStream {
        path: input.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "failed to capture encoder stdout"),
    })?;

    // Latest complete progress snapshot, shared with the reader task
    let latest: Arc<Mutex<Option<ProgressReport>>> = Arc::new(Mutex::new(None));

    let reader_latest = Arc::clone(&latest);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut current = ProgressReport::default();
        while let Ok(Some(line)) = lines.next_line().await {
            if current.apply_line(&line) {
                *reader_latest.lock().unwrap() = Some(current.clone());
            }
        }
        // partial trailing block still counts as a snapshot
        if current != ProgressReport::default() {
            *reader_latest.lock().unwrap() = Some(current);
        }
    });

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let early_exit_enabled = cfg.early_exit && cfg.keep_old && original_size > 0;

    loop {
        // first tick fires immediately, so cancellation is honored promptly
        interval.tick().await;

        if let Some(status) = child.try_wait().map_err(|e| FileError::ProgressStream {
            path: input.to_path_buf(),
            source: e,
        })? {
            let _ = reader.await;

            if !status.success() {
                return Err(FileError::EncoderExit {
                    path: input.to_path_buf(),
                    code: status.code(),
                });
            }
            return Ok(SessionOutcome::Completed);
        }

        let report = latest.lock().unwrap().clone();

        if let Some(ref r) = report {
            log_progress(input, r);
        }

        let outgrew_original = early_exit_enabled
            && report
                .as_ref()
                .and_then(|r| r.total_size)
                .map_or(false, |size| size > original_size);

        if outgrew_original {
            info!(
                "Output for {} already exceeds original ({} > {}), stopping encode",
                input.display(),
                format_size(report.as_ref().and_then(|r| r.total_size).unwrap_or(0), DECIMAL),
                format_size(original_size, DECIMAL),
            );
        }

        if token.is_cancelled() || outgrew_original {
            if token.is_cancelled() {
                warn!("Termination requested, stopping encode of {}", input.display());
            }
            stop_child(&mut child).await;
            let _ = reader.await;
            let last_report = latest.lock().unwrap().clone();
            return Ok(SessionOutcome::Killed { last_report });
        }
    }
}

/// Send the stop signal and wait for the encoder to exit. A kill error
/// usually means the process already exited; the wait below settles it.
async fn stop_child(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        debug!("Encoder stop signal failed (process likely exited): {}", e);
    }
    let _ = child.wait().await;
}

fn log_progress(input: &Path, report: &ProgressReport) {
    let size = report
        .total_size
        .map(|s| format_size(s, DECIMAL))
        .unwrap_or_else(|| "?".to_string());
    let out_time = report
        .out_time
        .map(|d| {
            let secs = d.as_secs();
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        })
        .unwrap_or_else(|| "?".to_string());
    let speed = report
        .speed
        .map(|s| format!("{:.2}x", s))
        .unwrap_or_else(|| "?".to_string());
    info!("Transcoding {}: {} written, at {}, {}", input.display(), size, out_time, speed);
}
