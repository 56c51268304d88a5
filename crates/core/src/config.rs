use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default ffmpeg flag template applied to every transcode.
/// The session adds `-y -i <input>` before and the progress plumbing plus
/// the temp output path after this template.
pub const DEFAULT_FLAGS: &str =
    "-map 0 -c:v libx265 -preset ultrafast -x265-params crf=16 -c:a aac -strict -2 -b:a 256k";

/// Configuration for the batch transcoder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// ffmpeg flag template inserted between input and output arguments
    pub flags: String,
    /// Extensions eligible for transcoding, exact match including the leading dot
    pub extensions: Vec<String>,
    /// Seconds between progress polls of a running encode
    pub interval_secs: u64,
    /// Surface the ffmpeg stderr stream for diagnostics
    pub stderr: bool,
    /// Keep the original file when the transcoded output is not smaller
    pub keep_old: bool,
    /// Kill the encode as soon as the output grows past the original (requires keep_old)
    pub early_exit: bool,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_bin: PathBuf,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl TranscoderConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            flags: DEFAULT_FLAGS.to_string(),
            extensions: vec![".mp4".to_string(), ".mkv".to_string(), ".flv".to_string()],
            interval_secs: 5,
            stderr: false,
            keep_old: false,
            early_exit: true,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }
}
