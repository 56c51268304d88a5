//! Keep/replace policy applied after a session terminates.
//!
//! Classification of a completed or killed encode plus the corresponding
//! filesystem mutation. No subprocess interaction happens here; the caller
//! re-reads the output metadata itself before calling in, because progress
//! reports are not trustworthy once the encoder has exited.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use humansize::{format_size, DECIMAL};
use log::info;

use crate::config::TranscoderConfig;
use crate::error::FileError;
use crate::ffprobe::FFProbeData;
use crate::notify::ResultKind;
use crate::progress::ProgressReport;

/// Size policy: with `keep_old` enabled the original wins ties, so the
/// transcode is discarded whenever it is not strictly smaller.
pub fn should_keep_original(keep_old: bool, original_bytes: u64, transcoded_bytes: u64) -> bool {
    keep_old && transcoded_bytes >= original_bytes
}

fn remove_file(path: &Path) -> Result<(), FileError> {
    fs::remove_file(path).map_err(|e| FileError::FsMutation {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Wind down a killed session: the temp output is assumed corrupt and
/// deleted; the original is never touched.
///
/// Returns the informational `KeptOriginal` outcome when the last report
/// shows the partial output had already outgrown the original. When it had
/// not, no terminal outcome is emitted at all for the file — a
/// long-standing quirk of this tool that callers and tests rely on
/// observing.
pub fn finalize_killed(
    input: &Path,
    temp_output: &Path,
    original_bytes: u64,
    last_report: Option<ProgressReport>,
) -> Result<Option<(ResultKind, ProgressReport)>, FileError> {
    match fs::remove_file(temp_output) {
        Ok(()) => {}
        // already gone is fine
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(FileError::FsMutation {
                path: temp_output.to_path_buf(),
                source: e,
            })
        }
    }

    if let Some(report) = last_report {
        if let Some(total_size) = report.total_size {
            if total_size > original_bytes {
                info!(
                    "Kept original {}: {} < {}",
                    input.display(),
                    format_size(original_bytes, DECIMAL),
                    format_size(total_size, DECIMAL),
                );
                return Ok(Some((ResultKind::KeptOriginal, report)));
            }
        }
    }

    Ok(None)
}

/// Classify a normally-completed session and mutate the filesystem:
/// either discard the temp output (keep-old policy) or replace the
/// original with it under the canonical extension.
pub fn finalize_completed(
    cfg: &TranscoderConfig,
    input: &Path,
    temp_output: &Path,
    canonical_output: &Path,
    original_bytes: u64,
    result_meta: &FFProbeData,
) -> Result<ResultKind, FileError> {
    let new_bytes = result_meta.format.size_bytes();

    if should_keep_original(cfg.keep_old, original_bytes, new_bytes) {
        remove_file(temp_output)?;
        info!(
            "Kept original {}: {} <= {}",
            input.display(),
            format_size(original_bytes, DECIMAL),
            format_size(new_bytes, DECIMAL),
        );
        return Ok(ResultKind::KeptOriginal);
    }

    remove_file(input)?;
    fs::rename(temp_output, canonical_output).map_err(|e| FileError::FsMutation {
        path: temp_output.to_path_buf(),
        source: e,
    })?;
    info!(
        "Replaced {} with transcoded: {} < {}",
        input.display(),
        format_size(new_bytes, DECIMAL),
        format_size(original_bytes, DECIMAL),
    );

    Ok(ResultKind::Replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffprobe::FFProbeFormat;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn meta_with_size(bytes: u64) -> FFProbeData {
        FFProbeData {
            streams: vec![],
            format: FFProbeFormat {
                format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
                duration: None,
                size: Some(bytes.to_string()),
                bit_rate: None,
                tags: None,
            },
        }
    }

    fn report_with_size(bytes: u64) -> ProgressReport {
        ProgressReport {
            total_size: Some(bytes),
            ..Default::default()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        temp_output: PathBuf,
        canonical_output: PathBuf,
    }

    fn fixture(ext: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join(format!("video.{ext}"));
        std::fs::write(&input, "original-bytes").unwrap();
        let temp_output = crate::sentinel::temp_output_path(&input);
        std::fs::write(&temp_output, "transcoded-bytes").unwrap();
        let canonical_output = crate::sentinel::canonical_output_path(&input);
        Fixture {
            _dir: dir,
            input,
            temp_output,
            canonical_output,
        }
    }

    proptest! {
        /// With keep-old enabled the outcome is KeptOriginal iff T >= O,
        /// otherwise the transcode always wins.
        #[test]
        fn test_keep_policy(original in 0u64..u64::MAX / 2, transcoded in 0u64..u64::MAX / 2, keep_old: bool) {
            let keep = should_keep_original(keep_old, original, transcoded);
            prop_assert_eq!(keep, keep_old && transcoded >= original);
        }
    }

    #[test]
    fn test_keep_policy_tie_favors_original() {
        assert!(should_keep_original(true, 1000, 1000));
        assert!(!should_keep_original(false, 1000, 1000));
    }

    #[test]
    fn test_completed_smaller_output_replaces_original() {
        // video.flv, 500 MB original, 300 MB transcode, keep-old disabled
        let fx = fixture("flv");
        let cfg = TranscoderConfig::default();

        let kind = finalize_completed(
            &cfg,
            &fx.input,
            &fx.temp_output,
            &fx.canonical_output,
            500_000_000,
            &meta_with_size(300_000_000),
        )
        .unwrap();

        assert_eq!(kind, ResultKind::Replaced);
        assert!(!fx.input.exists());
        assert!(!fx.temp_output.exists());
        assert!(fx.canonical_output.exists());
    }

    #[test]
    fn test_completed_larger_output_keeps_original_with_keep_old() {
        // video.mkv, 200 MB original, 250 MB transcode, keep-old enabled
        let fx = fixture("mkv");
        let cfg = TranscoderConfig {
            keep_old: true,
            ..Default::default()
        };

        let kind = finalize_completed(
            &cfg,
            &fx.input,
            &fx.temp_output,
            &fx.canonical_output,
            200_000_000,
            &meta_with_size(250_000_000),
        )
        .unwrap();

        assert_eq!(kind, ResultKind::KeptOriginal);
        assert!(fx.input.exists());
        assert!(!fx.temp_output.exists());
        assert!(!fx.canonical_output.exists());
    }

    #[test]
    fn test_completed_larger_output_replaces_without_keep_old() {
        let fx = fixture("mkv");
        let cfg = TranscoderConfig::default();

        let kind = finalize_completed(
            &cfg,
            &fx.input,
            &fx.temp_output,
            &fx.canonical_output,
            200_000_000,
            &meta_with_size(250_000_000),
        )
        .unwrap();

        assert_eq!(kind, ResultKind::Replaced);
        assert!(!fx.input.exists());
        assert!(fx.canonical_output.exists());
    }

    #[test]
    fn test_killed_deletes_temp_and_never_touches_original() {
        let fx = fixture("mkv");

        let outcome = finalize_killed(&fx.input, &fx.temp_output, 500_000_000, None).unwrap();

        assert!(outcome.is_none());
        assert!(fx.input.exists());
        assert!(!fx.temp_output.exists());
    }

    #[test]
    fn test_killed_with_oversized_report_is_informational_keep() {
        // termination mid-encode with 600 MB written against a 500 MB original
        let fx = fixture("mkv");

        let outcome = finalize_killed(
            &fx.input,
            &fx.temp_output,
            500_000_000,
            Some(report_with_size(600_000_000)),
        )
        .unwrap();

        let (kind, report) = outcome.unwrap();
        assert_eq!(kind, ResultKind::KeptOriginal);
        assert_eq!(report.total_size, Some(600_000_000));
        assert!(fx.input.exists());
        assert!(!fx.temp_output.exists());
    }

    #[test]
    fn test_killed_with_smaller_report_emits_nothing() {
        // Known-surprising: a kill with the partial output still smaller than
        // the original produces no terminal outcome at all, not even Error.
        let fx = fixture("mkv");

        let outcome = finalize_killed(
            &fx.input,
            &fx.temp_output,
            500_000_000,
            Some(report_with_size(100_000_000)),
        )
        .unwrap();

        assert!(outcome.is_none());
        assert!(fx.input.exists());
    }

    #[test]
    fn test_killed_tolerates_missing_temp_file() {
        let fx = fixture("mkv");
        std::fs::remove_file(&fx.temp_output).unwrap();

        let outcome = finalize_killed(&fx.input, &fx.temp_output, 1000, None).unwrap();
        assert!(outcome.is_none());
    }
}
