pub mod cancel;
pub mod config;
pub mod decision;
pub mod driver;
pub mod error;
pub mod ffprobe;
pub mod notify;
pub mod progress;
pub mod sentinel;
pub mod session;

pub use cancel::CancelToken;
pub use config::TranscoderConfig;
pub use error::FileError;
pub use ffprobe::{FFProbeData, FFProbeFormat, FFProbeStream};
pub use notify::{LogNotifier, NotificationSink, ResultKind};
pub use progress::ProgressReport;
pub use session::SessionOutcome;
