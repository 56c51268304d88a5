//! Parsing of the ffmpeg `-progress` key=value stream.
//!
//! ffmpeg emits blocks of `key=value` lines terminated by a
//! `progress=continue` (or `progress=end`) line. Parsing is best-effort:
//! unknown keys and malformed values are dropped, never fatal.

use std::time::Duration;

/// Snapshot of encoder-reported progress. The last snapshot observed before
/// a session terminates is retained as its terminal report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressReport {
    /// Frames encoded so far
    pub frame: Option<u64>,
    /// Instantaneous encode rate in frames per second
    pub fps: Option<f64>,
    /// Cumulative output size in bytes
    pub total_size: Option<u64>,
    /// Output timestamp reached so far
    pub out_time: Option<Duration>,
    /// Encode speed relative to realtime (the `1.25x` field)
    pub speed: Option<f64>,
    /// True once ffmpeg reported `progress=end`
    pub ended: bool,
}

impl ProgressReport {
    /// Apply one `key=value` line to the report under construction.
    /// Returns true when the line closes a block (`progress=...`).
    pub fn apply_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        let value = value.trim();

        match key.trim() {
            "frame" => self.frame = value.parse().ok().or(self.frame),
            "fps" => self.fps = value.parse().ok().or(self.fps),
            "total_size" => self.total_size = value.parse().ok().or(self.total_size),
            // out_time_ms is in microseconds despite the name
            "out_time_ms" | "out_time_us" => {
                self.out_time = value
                    .parse::<u64>()
                    .ok()
                    .map(Duration::from_micros)
                    .or(self.out_time);
            }
            "speed" => {
                self.speed = value
                    .trim_end_matches('x')
                    .parse()
                    .ok()
                    .or(self.speed);
            }
            "progress" => {
                self.ended = value == "end";
                return true;
            }
            _ => {}
        }

        false
    }
}
