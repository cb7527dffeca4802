use crate::config::Config;
use crate::proxy::StreamProxy;
use crate::recording::Recorder;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// User sessions (user_id → session)
    pub sessions: Arc<dyn SessionStore>,

    pub recorder: Arc<Recorder>,

    pub proxy: Arc<StreamProxy>,
}

impl AppState {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        let proxy = StreamProxy::from_config(&config.stream)?;
        let recorder = Recorder::from_config(&config, transcoder);

        Ok(Self {
            config: Arc::new(config),
            sessions,
            recorder: Arc::new(recorder),
            proxy: Arc::new(proxy),
        })
    }

    /// In-memory sessions and an ffmpeg transcoder
    pub fn from_config(config: Config) -> Result<Self> {
        let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.recording));
        Self::new(config, Arc::new(InMemorySessionStore::new()), transcoder)
    }

    /// Drop every session, terminating its transcoder and deleting its file.
    /// Returns how many recordings were discarded.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.sessions.drain().await;
        let mut discarded = 0;

        for session in &sessions {
            if self.recorder.discard_session(session).await {
                discarded += 1;
            }
        }

        info!(
            "Closed {} sessions, discarded {} recordings",
            sessions.len(),
            discarded
        );
        discarded
    }
}
