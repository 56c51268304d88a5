use std::path::PathBuf;
use thiserror::Error;

/// Per-file failure taxonomy. Every variant is caught at the file-processing
/// boundary in the Batch Driver, logged, and never aborts the batch.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Error reading marker {}: {source}", .path.display())]
    Sentinel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading metadata of {}: {cause}", .path.display())]
    MetadataRead { path: PathBuf, cause: anyhow::Error },

    #[error("Error spawning encoder for {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error on encoder progress stream for {}: {source}", .path.display())]
    ProgressStream {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder failed for {} (exit code {code:?})", .path.display())]
    EncoderExit { path: PathBuf, code: Option<i32> },

    #[error("Error mutating {}: {source}", .path.display())]
    FsMutation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = FileError::EncoderExit {
            path: PathBuf::from("/media/video.mkv"),
            code: Some(1),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/media/video.mkv"));
        assert!(msg.contains("exit code"));
    }
}
