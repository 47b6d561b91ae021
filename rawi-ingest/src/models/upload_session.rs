//! Upload session and per-file records
//!
//! One session is one user-initiated batch of files. Sessions are never
//! deleted; their temporary files are removed after processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default per-file result message until placement decides otherwise
pub const PENDING_FILE_MESSAGE: &str =
    "Not processed (audio files whose checksum is not referenced by an uploaded manifest are skipped).";

/// Result message for files with an unrecognized extension
pub const UNSUPPORTED_EXTENSION_MESSAGE: &str =
    "Only files with the mp3, xml and ogg extensions are accepted.";

/// What the batch is for: fresh recitations or replacement audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKind {
    NewAudio,
    ReplaceAudio,
}

/// Background processing status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    NotStarted,
    Running,
    Finished,
}

/// One user-initiated upload batch
#[derive(Debug, Clone, Serialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: SessionKind,
    pub upload_started_at: DateTime<Utc>,
    pub upload_ended_at: Option<DateTime<Utc>>,
    pub process_status: ProcessStatus,
    /// Percent complete, 0..=100
    pub process_progress: i64,
    pub process_started_at: Option<DateTime<Utc>>,
    pub process_ended_at: Option<DateTime<Utc>>,
}

/// One uploaded file within a session
#[derive(Debug, Clone, Serialize)]
pub struct UploadSessionFile {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub original_filename: String,
    pub content_type: String,
    pub byte_length: i64,
    /// Where the payload sits while awaiting placement; None when the
    /// file was rejected at upload time and nothing was stored
    pub temp_path: Option<String>,
    /// Audio checksum, computed by the placement job
    pub checksum: Option<String>,
    pub processed: bool,
    pub result_message: String,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::NewAudio => "NEW_AUDIO",
            SessionKind::ReplaceAudio => "REPLACE_AUDIO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW_AUDIO" => Some(SessionKind::NewAudio),
            "REPLACE_AUDIO" => Some(SessionKind::ReplaceAudio),
            _ => None,
        }
    }
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::NotStarted => "NOT_STARTED",
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(ProcessStatus::NotStarted),
            "RUNNING" => Some(ProcessStatus::Running),
            "FINISHED" => Some(ProcessStatus::Finished),
            _ => None,
        }
    }
}

impl UploadSession {
    /// Create a new session in the NotStarted state
    pub fn new(user_id: Uuid, kind: SessionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            upload_started_at: Utc::now(),
            upload_ended_at: None,
            process_status: ProcessStatus::NotStarted,
            process_progress: 0,
            process_started_at: None,
            process_ended_at: None,
        }
    }
}

impl UploadSessionFile {
    /// Record a freshly uploaded file, not yet examined by placement
    pub fn new(
        session_id: Uuid,
        name: String,
        original_filename: String,
        content_type: String,
        byte_length: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            name,
            original_filename,
            content_type,
            byte_length,
            temp_path: None,
            checksum: None,
            processed: false,
            result_message: PENDING_FILE_MESSAGE.to_string(),
        }
    }

    /// Lowercased extension of the original filename, without the dot
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.original_filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}
