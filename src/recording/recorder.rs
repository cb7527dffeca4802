use super::RecordingFile;
use crate::config::Config;
use crate::error::RecordingError;
use crate::session::UserSession;
use crate::transcoder::{wait_finished, TranscodeHandle, TranscodeOutcome, TranscodeState, Transcoder};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A transcoding process owned by one session
#[derive(Debug)]
pub struct ActiveRecording {
    /// Distinguishes this recording from a later one in the same session
    pub id: Uuid,
    pub filename: String,
    /// When the transcoder was launched (tokio clock)
    pub started_at: Instant,
    // Declared before `file` so the process is told to stop before the file is deleted
    handle: TranscodeHandle,
    file: RecordingFile,
}

#[derive(Debug, Clone)]
pub struct StartedRecording {
    pub filename: String,
    pub file_path: PathBuf,
}

/// A stopped recording whose file passed verification.
///
/// Still owns the file: dropping it deletes the MP3.
#[derive(Debug)]
pub struct FinishedRecording {
    pub filename: String,
    pub size: u64,
    pub duration: Duration,
    pub(crate) file: RecordingFile,
}

impl FinishedRecording {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Drives the recording state machine of a session:
/// `Idle -> Recording -> Idle`
pub struct Recorder {
    transcoder: Arc<dyn Transcoder>,
    source_url: String,
    recordings_dir: PathBuf,
    min_duration: Duration,
}

impl Recorder {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        source_url: impl Into<String>,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcoder,
            source_url: source_url.into(),
            recordings_dir: recordings_dir.into(),
            min_duration: Duration::from_millis(1000),
        }
    }

    pub fn from_config(config: &Config, transcoder: Arc<dyn Transcoder>) -> Self {
        Self::new(transcoder, config.stream.url.clone(), config.recording.dir.clone())
            .with_min_duration(config.recording.min_duration())
    }

    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// `{userID}_{timestamp}.mp3` inside the recordings directory
    pub fn output_path(&self, user_id: &str, timestamp_ms: i64) -> (String, PathBuf) {
        let filename = format!("{}_{}.mp3", user_id, timestamp_ms);
        let file_path = self.recordings_dir.join(&filename);
        (filename, file_path)
    }

    /// Start recording for `session`, discarding any recording already running.
    ///
    /// The session lock is held until the new process is registered, so
    /// concurrent starts for one user cannot leave two processes behind.
    pub async fn start(&self, session: &Arc<UserSession>) -> Result<StartedRecording, RecordingError> {
        let user_id = session.user_id();
        let mut state = session.lock().await;

        if let Some(previous) = state.recording.take() {
            info!(
                "Found existing recording for user {}, cleaning up {}",
                user_id, previous.filename
            );
            self.discard(previous).await;
        }

        let (filename, file_path) = self.output_path(user_id, Utc::now().timestamp_millis());
        // Owns whatever the transcoder writes, even if launching fails half way
        let file = RecordingFile::new(file_path.clone());

        let handle = self
            .transcoder
            .start(&self.source_url, &file_path)
            .await
            .map_err(|e| RecordingError::StartFailed(format!("{:#}", e)))?;

        let id = Uuid::new_v4();
        watch_for_failure(session, id, handle.subscribe());

        state.recording = Some(ActiveRecording {
            id,
            filename: filename.clone(),
            started_at: Instant::now(),
            handle,
            file,
        });

        info!(
            "Recording started for user {} with {} => {}",
            user_id,
            self.transcoder.name(),
            file_path.display()
        );

        Ok(StartedRecording {
            filename,
            file_path,
        })
    }

    /// Stop the session's recording and hand back the verified file.
    ///
    /// The session is `Idle` afterwards whether or not verification passes.
    pub async fn stop(&self, session: &UserSession) -> Result<FinishedRecording, RecordingError> {
        let user_id = session.user_id();
        let mut state = session.lock().await;

        let recording = state
            .recording
            .take()
            .ok_or(RecordingError::NoActiveRecording)?;

        let elapsed = recording.started_at.elapsed();
        if elapsed < self.min_duration {
            let remaining = self.min_duration - elapsed;
            debug!(
                "Recording for user {} is {}ms old, delaying stop by {}ms",
                user_id,
                elapsed.as_millis(),
                remaining.as_millis()
            );
            sleep(remaining).await;
        }

        let ActiveRecording {
            filename,
            started_at,
            handle,
            file,
            ..
        } = recording;

        let outcome = handle.stop().await;
        drop(state);

        if let TranscodeOutcome::Failed(reason) = &outcome {
            warn!("Transcoder for user {} reported failure on stop: {}", user_id, reason);
        }

        // On error `file` is dropped here and the broken output deleted
        let size = verify_output(file.path()).await?;
        let duration = started_at.elapsed();
        info!(
            "Recording stopped for user {}: {} ({} bytes, {:.1}s)",
            user_id,
            file.path().display(),
            size,
            duration.as_secs_f64()
        );

        Ok(FinishedRecording {
            filename,
            size,
            duration,
            file,
        })
    }

    /// Terminate a recording nobody will collect; its file goes with it
    pub async fn discard(&self, recording: ActiveRecording) {
        let ActiveRecording {
            filename,
            handle,
            file,
            ..
        } = recording;

        let outcome = handle.stop().await;
        debug!("Discarded recording {} ({:?})", filename, outcome);
        drop(file);
    }

    /// Discard whatever `session` is recording; returns whether anything was running
    pub async fn discard_session(&self, session: &UserSession) -> bool {
        let mut state = session.lock().await;

        match state.recording.take() {
            Some(recording) => {
                self.discard(recording).await;
                true
            }
            None => false,
        }
    }
}

/// Reset the session when its transcoder dies on its own.
///
/// Holds only a weak reference so evicted sessions are not kept alive.
fn watch_for_failure(session: &Arc<UserSession>, id: Uuid, mut state_rx: watch::Receiver<TranscodeState>) {
    let session = Arc::downgrade(session);

    tokio::spawn(async move {
        let TranscodeOutcome::Failed(reason) = wait_finished(&mut state_rx).await else {
            return;
        };
        let Some(session) = session.upgrade() else {
            return;
        };

        let mut state = session.lock().await;
        if state.recording.as_ref().map(|recording| recording.id) != Some(id) {
            // Already stopped or replaced
            return;
        }

        // Dropping the recording deletes the partial file
        if let Some(recording) = state.recording.take() {
            warn!(
                "Recording {} for user {} failed, resetting session: {}",
                recording.filename,
                session.user_id(),
                reason
            );
        }
    });
}

async fn verify_output(path: &Path) -> Result<u64, RecordingError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() == 0 => Err(RecordingError::FileEmpty),
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RecordingError::FileMissing),
        Err(e) => Err(e.into()),
    }
}
