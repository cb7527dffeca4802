use super::stats::SessionSnapshot;
use crate::recording::ActiveRecording;
use std::ops::{Deref, DerefMut};
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::info;

/// Mutable part of a session; only reachable through [`UserSession::lock`]
#[derive(Debug, Default)]
pub struct SessionState {
    /// Whether the user flagged themselves as listening
    pub stream_active: bool,

    /// The running transcoder, if any
    pub recording: Option<ActiveRecording>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_recording: self.recording.is_some(),
            is_streaming: self.stream_active,
            recording_file: self
                .recording
                .as_ref()
                .map(|recording| recording.filename.clone()),
        }
    }
}

/// One client's streaming flag and recording state
#[derive(Debug)]
pub struct UserSession {
    user_id: String,

    /// Serializes state transitions across their awaited steps
    state: Mutex<SessionState>,

    /// Last committed state, readable while a transition holds the lock
    published: watch::Sender<SessionSnapshot>,

    /// Refreshed on every store lookup, drives idle eviction
    last_seen: std::sync::Mutex<Instant>,
}

/// Exclusive access to a session's state.
///
/// Releasing the guard publishes the resulting snapshot.
pub struct SessionGuard<'a> {
    state: MutexGuard<'a, SessionState>,
    published: &'a watch::Sender<SessionSnapshot>,
}

impl Deref for SessionGuard<'_> {
    type Target = SessionState;

    fn deref(&self) -> &SessionState {
        &self.state
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let snapshot = self.state.snapshot();
        self.published.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

impl UserSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Mutex::new(SessionState::default()),
            published: watch::Sender::new(SessionSnapshot::default()),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            state: self.state.lock().await,
            published: &self.published,
        }
    }

    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Raise the listening flag; returns false if it was already raised
    pub async fn start_stream(&self) -> bool {
        let mut state = self.lock().await;
        if state.stream_active {
            info!("Stream is already active for user {}", self.user_id);
            return false;
        }

        state.stream_active = true;
        info!("Stream started for user {}", self.user_id);
        true
    }

    /// Lower the listening flag; returns false if it was not raised
    pub async fn stop_stream(&self) -> bool {
        let mut state = self.lock().await;
        if !state.stream_active {
            return false;
        }

        state.stream_active = false;
        info!("Stream stopped for user {}", self.user_id);
        true
    }

    /// State as of the last released lock; never waits on a transition in progress
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.borrow().clone()
    }
}
