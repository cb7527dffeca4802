use super::{FinishedRecording, RecordingFile};
use crate::error::RecordingError;
use axum::{
    body::{Body, Bytes},
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::info;

const CHUNK_SIZE: usize = 64 * 1024;

/// A finished recording streamed back to the client.
///
/// The file is deleted as soon as the body has been sent in full or dropped
/// by a disconnecting client.
pub struct RecordingDownload {
    file: File,
    guard: RecordingFile,
    filename: String,
    size: u64,
}

impl RecordingDownload {
    pub async fn open(recording: FinishedRecording) -> Result<Self, RecordingError> {
        // `recording` still owns the file, so a failed open deletes it too
        let file = File::open(recording.path()).await?;

        info!(
            "Sending file to client: {} ({} bytes)",
            recording.path().display(),
            recording.size
        );

        Ok(Self {
            file,
            guard: recording.file,
            filename: recording.filename,
            size: recording.size,
        })
    }

    fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        stream::try_unfold((self.file, self.guard), |(mut file, guard)| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let read = file.read(&mut buf).await?;
            if read == 0 {
                return Ok(None);
            }

            buf.truncate(read);
            Ok(Some((Bytes::from(buf), (file, guard))))
        })
    }
}

impl IntoResponse for RecordingDownload {
    fn into_response(self) -> Response {
        let headers = [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, self.size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", self.filename),
            ),
        ];

        (headers, Body::from_stream(self.into_stream())).into_response()
    }
}
