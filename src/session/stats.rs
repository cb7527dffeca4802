use serde::Serialize;

/// Point-in-time view of a session, as reported by the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Whether a transcoder is registered for the session
    pub is_recording: bool,

    /// Whether the listening flag is raised
    pub is_streaming: bool,

    /// Name of the file being recorded, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_file: Option<String>,
}
