pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod recording;
pub mod session;
pub mod transcoder;

pub use config::Config;
pub use error::{ApiError, RecordingError};
pub use http::{create_router, AppState, UserId};
pub use proxy::StreamProxy;
pub use recording::{purge_orphans, Recorder, RecordingDownload};
pub use session::{InMemorySessionStore, SessionSnapshot, SessionStore, UserSession};
pub use transcoder::{FfmpegTranscoder, TranscodeHandle, TranscodeOutcome, TranscodeState, Transcoder};
