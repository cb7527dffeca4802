//! Transcoder invocation
//!
//! A [`Transcoder`] launches an external process that pulls the live stream in
//! real time and writes an MP3 file. The process is owned by a supervisor task;
//! callers only hold a [`TranscodeHandle`], which reports the process
//! lifecycle through a watch channel:
//!
//! - `Running` once the process has been launched (start)
//! - `Finished(Failed(..))` when it dies without being asked to (error)
//! - `Finished(Completed | Stopped { .. })` when it ends (end)
//!
//! Stopping is acknowledged: [`TranscodeHandle::stop`] returns only after the
//! supervisor has seen the process exit or has killed it.

mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use anyhow::Result;
use std::future::Future;
use std::path::Path;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

/// How a transcoding process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// Exited successfully on its own (upstream ended)
    Completed,

    /// Exited after a stop request; `forced` when it had to be killed
    Stopped { forced: bool },

    /// Failed without a stop request
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeState {
    Running,
    Finished(TranscodeOutcome),
}

impl TranscodeState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TranscodeState::Finished(_))
    }

    pub fn outcome(&self) -> Option<&TranscodeOutcome> {
        match self {
            TranscodeState::Running => None,
            TranscodeState::Finished(outcome) => Some(outcome),
        }
    }
}

/// Launches transcoding processes
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    /// Start transcoding `source_url` into an MP3 at `output`
    async fn start(&self, source_url: &str, output: &Path) -> Result<TranscodeHandle>;

    /// Get transcoder name for logging
    fn name(&self) -> &str;
}

/// Exclusive handle on one running transcoding process.
///
/// Dropping the handle without calling [`stop`](Self::stop) still asks the
/// supervisor to terminate the process.
pub struct TranscodeHandle {
    label: String,
    stop_tx: Option<oneshot::Sender<()>>,
    state_rx: watch::Receiver<TranscodeState>,
}

impl TranscodeHandle {
    /// Spawn a supervisor task around `run`.
    ///
    /// `run` receives the stop signal and must resolve once the process it
    /// owns has exited.
    pub fn spawn<F, Fut>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = TranscodeOutcome> + Send + 'static,
    {
        let label = label.into();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(TranscodeState::Running);

        let supervised = run(stop_rx);
        let task_label = label.clone();
        tokio::spawn(async move {
            let outcome = supervised.await;

            match &outcome {
                TranscodeOutcome::Completed => info!("Transcoder {} ended", task_label),
                TranscodeOutcome::Stopped { forced: false } => {
                    info!("Transcoder {} stopped", task_label)
                }
                TranscodeOutcome::Stopped { forced: true } => {
                    warn!("Transcoder {} killed after grace period", task_label)
                }
                TranscodeOutcome::Failed(reason) => {
                    error!("Transcoder {} failed: {}", task_label, reason)
                }
            }

            state_tx.send_replace(TranscodeState::Finished(outcome));
        });

        Self {
            label,
            stop_tx: Some(stop_tx),
            state_rx,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TranscodeState {
        self.state_rx.borrow().clone()
    }

    /// Watch lifecycle changes without owning the process
    pub fn subscribe(&self) -> watch::Receiver<TranscodeState> {
        self.state_rx.clone()
    }

    /// Ask the process to stop and wait until it has exited
    pub async fn stop(mut self) -> TranscodeOutcome {
        self.signal_stop();
        wait_finished(&mut self.state_rx).await
    }

    fn signal_stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // Err means the supervisor already finished
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for TranscodeHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

impl std::fmt::Debug for TranscodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeHandle")
            .field("label", &self.label)
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

/// Wait for a watched process to finish and return its outcome
pub async fn wait_finished(state_rx: &mut watch::Receiver<TranscodeState>) -> TranscodeOutcome {
    match state_rx.wait_for(TranscodeState::is_finished).await {
        Ok(state) => state
            .outcome()
            .cloned()
            .unwrap_or_else(|| TranscodeOutcome::Failed("transcoder state lost".to_string())),
        Err(_) => TranscodeOutcome::Failed("transcoder supervisor exited without reporting".to_string()),
    }
}
