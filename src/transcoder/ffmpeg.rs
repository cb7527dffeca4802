use super::{TranscodeHandle, TranscodeOutcome, Transcoder};
use crate::config::RecordingConfig;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines of stderr kept for failure diagnostics
const STDERR_TAIL_LINES: usize = 20;

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// Records a live stream to MP3 with an `ffmpeg` child process
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    bitrate_kbps: u32,
    channels: u16,
    sample_rate: u32,
    stop_grace: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            bitrate_kbps: 128,
            channels: 2,
            sample_rate: 44_100,
            stop_grace: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            bitrate_kbps: config.bitrate_kbps,
            channels: config.channels,
            sample_rate: config.sample_rate,
            stop_grace: config.stop_grace(),
        }
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    /// Arguments passed to the binary: real-time read of the source,
    /// fixed-bitrate MP3 output, overwrite allowed
    pub fn command_args(&self, source_url: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-re",
            "-i",
            source_url,
            "-vn",
            "-acodec",
            "libmp3lame",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push("-ab".into());
        args.push(format!("{}k", self.bitrate_kbps).into());
        args.push("-ac".into());
        args.push(self.channels.to_string().into());
        args.push("-ar".into());
        args.push(self.sample_rate.to_string().into());
        args.push(output.as_os_str().to_os_string());
        args
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn start(&self, source_url: &str, output: &Path) -> Result<TranscodeHandle> {
        let args = self.command_args(source_url, output);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        info!(
            "Transcoder started (pid {}): {} {}",
            child.id().map(|pid| pid.to_string()).unwrap_or_default(),
            self.binary.display(),
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(collect_stderr(stderr, Arc::clone(&stderr_tail)));
        }

        let label = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.display().to_string());
        let stop_grace = self.stop_grace;

        Ok(TranscodeHandle::spawn(label, move |stop_rx| {
            supervise(child, stop_rx, stop_grace, stderr_tail)
        }))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Own the child until it exits on its own or a stop is requested
async fn supervise(
    mut child: Child,
    mut stop_rx: oneshot::Receiver<()>,
    stop_grace: Duration,
    stderr_tail: StderrTail,
) -> TranscodeOutcome {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = &mut stop_rx => None,
    };

    match exited {
        Some(Ok(status)) if status.success() => TranscodeOutcome::Completed,
        Some(Ok(status)) => TranscodeOutcome::Failed(format!(
            "process exited with {}{}",
            status,
            describe_tail(&stderr_tail)
        )),
        Some(Err(e)) => TranscodeOutcome::Failed(format!("failed to wait for process: {}", e)),
        None => terminate(&mut child, stop_grace).await,
    }
}

/// SIGTERM, then wait at most `stop_grace` before SIGKILL
async fn terminate(child: &mut Child, stop_grace: Duration) -> TranscodeOutcome {
    if let Err(e) = send_terminate(child) {
        warn!("{:#}", e);
    }

    match timeout(stop_grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("Transcoder exited after stop request: {}", status);
            TranscodeOutcome::Stopped { forced: false }
        }
        Ok(Err(e)) => TranscodeOutcome::Failed(format!("failed to wait for process: {}", e)),
        Err(_) => {
            if let Err(e) = child.kill().await {
                return TranscodeOutcome::Failed(format!("failed to kill process: {}", e));
            }
            TranscodeOutcome::Stopped { forced: true }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // None: already reaped
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let pid = i32::try_from(pid).context("Transcoder pid out of range")?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).context("Failed to send SIGTERM to transcoder")
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> Result<()> {
    child.start_kill().context("Failed to terminate transcoder")
}

async fn collect_stderr(stderr: ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!("ffmpeg: {}", line);

        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

fn describe_tail(tail: &StderrTail) -> String {
    match tail.lock() {
        Ok(tail) if !tail.is_empty() => {
            format!(": {}", tail.iter().cloned().collect::<Vec<_>>().join(" | "))
        }
        _ => String::new(),
    }
}
