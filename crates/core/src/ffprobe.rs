use std::collections::HashMap;
use std::path::Path;
use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use crate::config::TranscoderConfig;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    #[serde(rename = "format_name")]
    pub format_name: String,
    pub duration: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "bit_rate")]
    pub bit_rate: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    #[serde(rename = "codec_type")]
    pub codec_type: Option<String>,
    #[serde(rename = "codec_name")]
    pub codec_name: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    #[serde(rename = "bit_rate")]
    pub bit_rate: Option<String>,
}

impl FFProbeFormat {
    /// Container size in raw bytes, 0 when ffprobe reported none.
    /// Size comparisons in the Decision Engine use this value.
    pub fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Container duration in seconds, if reported
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.as_deref().and_then(|s| s.parse::<f64>().ok())
    }
}

/// Run ffprobe against a file and parse the JSON output
pub async fn probe_file(cfg: &TranscoderConfig, file_path: &Path) -> Result<FFProbeData> {
    use log::debug;

    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    debug!("Executing ffprobe for: {}", file_path.display());

    let output = Command::new(&cfg.ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .output()
        .await
        .with_context(|| {
            format!(
                "Failed to execute ffprobe for: {}. Ensure ffprobe is accessible at: {}",
                file_path.display(),
                cfg.ffprobe_bin.display()
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "ffprobe failed (exit code {}) for {}:\nSTDERR: {}",
            exit_code,
            file_path.display(),
            stderr
        );
    }

    let json_str = String::from_utf8(output.stdout)
        .context("ffprobe output is not valid UTF-8")?;

    let data: FFProbeData = serde_json::from_str(&json_str)
        .with_context(|| format!("Failed to parse ffprobe JSON for: {}", file_path.display()))?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "bit_rate": "10000000"
            },
            {
                "index": 1,
                "codec_type": "audio",
                "codec_name": "aac",
                "bit_rate": "128000"
            }
        ],
        "format": {
            "format_name": "matroska,webm",
            "duration": "5400.234000",
            "size": "524288000",
            "bit_rate": "10128000"
        }
    }"#;

    #[test]
    fn test_parse_ffprobe_json() {
        let data: FFProbeData = serde_json::from_str(SAMPLE_JSON).unwrap();
        assert_eq!(data.streams.len(), 2);
        assert_eq!(data.streams[0].codec_name.as_deref(), Some("h264"));
        assert_eq!(data.streams[0].width, Some(1920));
        assert_eq!(data.format.format_name, "matroska,webm");
    }

    #[test]
    fn test_size_bytes() {
        let data: FFProbeData = serde_json::from_str(SAMPLE_JSON).unwrap();
        assert_eq!(data.format.size_bytes(), 524_288_000);
    }

    #[test]
    fn test_size_bytes_missing_or_malformed_is_zero() {
        let format = FFProbeFormat {
            format_name: "mov,mp4".to_string(),
            duration: None,
            size: None,
            bit_rate: None,
            tags: None,
        };
        assert_eq!(format.size_bytes(), 0);

        let format = FFProbeFormat {
            size: Some("not-a-number".to_string()),
            ..format
        };
        assert_eq!(format.size_bytes(), 0);
    }

    #[test]
    fn test_duration_secs() {
        let data: FFProbeData = serde_json::from_str(SAMPLE_JSON).unwrap();
        let secs = data.format.duration_secs().unwrap();
        assert!((secs - 5400.234).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_error() {
        let cfg = TranscoderConfig::default();
        let err = probe_file(&cfg, Path::new("/nonexistent/video.mkv"))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("does not exist"));
    }
}
