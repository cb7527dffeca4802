// Shared fixtures for integration tests
//
// `FakeTranscoder` stands in for ffmpeg: it writes a small payload to the
// output path on start and "runs" until stopped or crashed.

#![allow(dead_code)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use radio_recorder::config::Config;
use radio_recorder::transcoder::{TranscodeHandle, TranscodeOutcome, Transcoder};
use radio_recorder::{AppState, InMemorySessionStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const FAKE_MP3: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake-mp3-frames";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutput {
    /// Write `FAKE_MP3` to the output path
    Payload,
    /// Create the output file but leave it empty
    Empty,
    /// Never create the output file
    Missing,
}

pub struct FakeTranscoder {
    output: FakeOutput,
    fail_start: bool,
    starts: AtomicUsize,
    running: Arc<AtomicUsize>,
    outputs: Mutex<Vec<PathBuf>>,
    crash_tx: broadcast::Sender<()>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::with_output(FakeOutput::Payload)
    }

    pub fn with_output(output: FakeOutput) -> Self {
        let (crash_tx, _) = broadcast::channel(4);
        Self {
            output,
            fail_start: false,
            starts: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            outputs: Mutex::new(Vec::new()),
            crash_tx,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Number of start() calls that launched a process
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of fake processes that have not exited yet
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }

    /// Make every running fake process fail as if the transcoder died
    pub fn crash_all(&self) {
        let _ = self.crash_tx.send(());
    }
}

#[async_trait::async_trait]
impl Transcoder for FakeTranscoder {
    async fn start(&self, _source_url: &str, output: &Path) -> Result<TranscodeHandle> {
        if self.fail_start {
            anyhow::bail!("No such file or directory (os error 2)");
        }

        match self.output {
            FakeOutput::Payload => tokio::fs::write(output, FAKE_MP3).await?,
            FakeOutput::Empty => tokio::fs::write(output, b"").await?,
            FakeOutput::Missing => {}
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        self.outputs.lock().unwrap().push(output.to_path_buf());

        let running = Arc::clone(&self.running);
        running.fetch_add(1, Ordering::SeqCst);
        let mut crash_rx = self.crash_tx.subscribe();

        let label = output.file_name().unwrap().to_string_lossy().into_owned();
        Ok(TranscodeHandle::spawn(label, move |stop_rx| async move {
            let outcome = tokio::select! {
                _ = stop_rx => TranscodeOutcome::Stopped { forced: false },
                _ = crash_rx.recv() => TranscodeOutcome::Failed("simulated crash".to_string()),
            };
            running.fetch_sub(1, Ordering::SeqCst);
            outcome
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Config pointing recordings at `dir` and the stream at `stream_url`
pub fn test_config(dir: &Path, stream_url: &str) -> Config {
    let mut config = Config::default();
    config.recording.dir = dir.to_path_buf();
    config.stream.url = stream_url.to_string();
    config.stream.connect_timeout_secs = 2;
    config
}

pub fn test_state(config: Config, transcoder: Arc<FakeTranscoder>) -> AppState {
    AppState::new(config, Arc::new(InMemorySessionStore::new()), transcoder).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Files currently in `dir`
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

/// Poll `check` until it holds or `limit` elapses
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
