use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ownership of a recording file on disk.
///
/// The file is deleted when this value is dropped. It moves from the running
/// recording to the finished one and then into the download body, so a
/// request cancelled at any await point leaves nothing behind.
#[derive(Debug)]
pub struct RecordingFile(PathBuf);

impl RecordingFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for RecordingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("Deleted recording file: {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Error deleting file {}: {}", self.0.display(), e),
        }
    }
}
