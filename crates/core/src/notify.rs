//! Terminal-outcome delivery boundary.
//!
//! The driver hands every terminal classification to a sink and moves on;
//! delivery is fire-and-forget and must never affect file processing.

use humansize::{format_size, DECIMAL};
use log::info;
use crate::ffprobe::FFProbeData;
use crate::progress::ProgressReport;

/// Terminal classification of one processed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Replaced,
    KeptOriginal,
    Error,
}

/// Receives terminal outcomes for delivery (logging, chat bots, ...)
pub trait NotificationSink: Send + Sync {
    fn notify_end(
        &self,
        result: Option<&FFProbeData>,
        report: Option<&ProgressReport>,
        kind: ResultKind,
    );
}

/// Default sink: one info line per outcome
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify_end(
        &self,
        result: Option<&FFProbeData>,
        report: Option<&ProgressReport>,
        kind: ResultKind,
    ) {
        let label = match kind {
            ResultKind::Replaced => "replaced",
            ResultKind::KeptOriginal => "kept original",
            ResultKind::Error => "error",
        };

        let mut details = Vec::new();
        if let Some(size) = result
            .map(|m| m.format.size_bytes())
            .or_else(|| report.and_then(|r| r.total_size))
        {
            details.push(format_size(size, DECIMAL));
        }
        if let Some(secs) = result.and_then(|m| m.format.duration_secs()) {
            details.push(format_duration(secs));
        }

        if kind == ResultKind::Error || details.is_empty() {
            info!("Result: {}", label);
        } else {
            info!("Result: {} ({})", label, details.join(", "));
        }
    }
}

/// HH:MM:SS, the same shape the per-tick progress lines use
fn format_duration(secs: f64) -> String {
    let s = secs.round() as u64;
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_clock_style() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(59.6), "00:01:00");
        assert_eq!(format_duration(5400.234), "01:30:00");
        assert_eq!(format_duration(3723.0), "01:02:03");
    }
}
