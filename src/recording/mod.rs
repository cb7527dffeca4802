//! On-demand recording of the live stream
//!
//! - [`Recorder`]: start/stop/discard per session, minimum duration, output
//!   verification
//! - [`RecordingFile`]: owns a file on disk, deleting it when dropped
//! - [`RecordingDownload`]: response body that deletes the file once sent
//! - [`purge_orphans`]: startup cleanup of files left by a previous process

mod download;
mod file;
mod recorder;

pub use download::RecordingDownload;
pub use file::RecordingFile;
pub use recorder::{ActiveRecording, FinishedRecording, Recorder, StartedRecording};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Create `dir` if needed and delete any `.mp3` left in it.
///
/// Sessions do not survive a restart, so nothing can claim these files.
pub async fn purge_orphans(dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create recordings directory {}", dir.display()))?;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read recordings directory {}", dir.display()))?;

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_mp3 = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 || !entry.file_type().await?.is_file() {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove orphaned recording {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("Removed {} orphaned recordings from {}", removed, dir.display());
    }

    Ok(removed)
}
