use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use std::path::PathBuf;
use transcoder_core::{driver, CancelToken, LogNotifier, TranscoderConfig};

/// Opinionated batch wrapper around ffmpeg: transcodes each matching file,
/// replaces the original when the result is acceptable, and marks files as
/// processed so repeated runs are idempotent.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files or glob patterns to transcode
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<String>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The base ffmpeg flags used for all transcodes
    #[arg(short, long)]
    flags: Option<String>,

    /// Transcoded file extensions (exact match, leading dot)
    #[arg(short, long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// How often to output transcoding status, in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Output the ffmpeg stderr stream
    #[arg(long)]
    stderr: bool,

    /// Keep old version of video if transcoded version is larger
    #[arg(long)]
    keep_old: bool,

    /// Early exit if transcoded version is larger than original (requires --keep-old)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    early_exit: Option<bool>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// File config first, explicit flags override it
    fn into_config(self) -> Result<(TranscoderConfig, Vec<String>)> {
        let mut cfg = TranscoderConfig::load_config(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(flags) = self.flags {
            cfg.flags = flags;
        }
        if let Some(extensions) = self.extensions {
            cfg.extensions = extensions;
        }
        if let Some(interval) = self.interval {
            cfg.interval_secs = interval;
        }
        if self.stderr {
            cfg.stderr = true;
        }
        if self.keep_old {
            cfg.keep_old = true;
        }
        if let Some(early_exit) = self.early_exit {
            cfg.early_exit = early_exit;
        }

        Ok((cfg, self.paths))
    }
}

/// Trip the token once on the first interrupt or terminate signal
fn spawn_signal_listener(token: CancelToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        warn!("Termination signal received, finishing current cleanup");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let (cfg, paths) = args.into_config()?;
    debug!("Configuration: {:?}", cfg);

    let token = CancelToken::new();
    spawn_signal_listener(token.clone());

    let notifier = LogNotifier;
    driver::run_batch(&cfg, &paths, &token, &notifier).await
}
