//! Recitation catalog entries
//!
//! A recitation is one audio narration of one poem, with attribution,
//! review state, and a sync flag describing whether its remote copies
//! match the local files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderation state of a recitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

/// Whether the remote stores reflect the local files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Created locally, never published
    NewItem,
    /// Published before, local audio replaced since
    FilesChanged,
    /// Remote copies match local state (or nothing remains to publish)
    Synchronized,
}

/// One published or draft audio attachment to a poem
#[derive(Debug, Clone, Serialize)]
pub struct Recitation {
    pub id: i64,
    pub user_id: Uuid,
    pub poem_id: i64,
    /// Display order among recitations of the same poem
    pub audio_order: i64,
    pub title: String,
    pub artist_name: String,
    pub artist_url: String,
    pub source_name: String,
    pub source_url: String,
    /// Identifier carried from the submitting client, unique catalog-wide
    pub legacy_guid: Uuid,
    pub checksum: String,
    pub audio_size_bytes: i64,
    /// Final filename without extension, e.g. `42-hrm1`
    pub filename_stem: String,
    /// Repository subfolder the files were placed into
    pub sound_files_folder: String,
    pub local_audio_path: String,
    pub local_manifest_path: String,
    pub review_status: ReviewStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub review_message: Option<String>,
    pub sync_status: SyncStatus,
    pub uploaded_at: DateTime<Utc>,
    pub file_updated_at: DateTime<Utc>,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Draft => "DRAFT",
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(ReviewStatus::Draft),
            "PENDING" => Some(ReviewStatus::Pending),
            "APPROVED" => Some(ReviewStatus::Approved),
            "REJECTED" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    /// Only draft and pending recitations may be moderated
    pub fn is_moderatable(&self) -> bool {
        matches!(self, ReviewStatus::Draft | ReviewStatus::Pending)
    }
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NewItem => "NEW_ITEM",
            SyncStatus::FilesChanged => "FILES_CHANGED",
            SyncStatus::Synchronized => "SYNCHRONIZED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW_ITEM" => Some(SyncStatus::NewItem),
            "FILES_CHANGED" => Some(SyncStatus::FilesChanged),
            "SYNCHRONIZED" => Some(SyncStatus::Synchronized),
            _ => None,
        }
    }
}

impl Recitation {
    /// Remote path of the manifest file, relative to the store root
    pub fn remote_manifest_path(&self) -> String {
        format!("/{}/x/{}.xml", self.sound_files_folder, self.filename_stem)
    }

    /// Remote path of the audio file, relative to the store root
    pub fn remote_audio_path(&self) -> String {
        format!("/{}/{}.mp3", self.sound_files_folder, self.filename_stem)
    }

    /// Public download URL of the published audio file
    pub fn audio_url(&self, audio_base_url: &str) -> String {
        format!(
            "{}{}",
            audio_base_url.trim_end_matches('/'),
            self.remote_audio_path()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_paths_follow_layout() {
        let recitation = sample();
        assert_eq!(recitation.remote_audio_path(), "/a/42-hrm.mp3");
        assert_eq!(recitation.remote_manifest_path(), "/a/x/42-hrm.xml");
        assert_eq!(
            recitation.audio_url("https://cdn.example.org/"),
            "https://cdn.example.org/a/42-hrm.mp3"
        );
    }

    #[test]
    fn moderatable_statuses() {
        assert!(ReviewStatus::Draft.is_moderatable());
        assert!(ReviewStatus::Pending.is_moderatable());
        assert!(!ReviewStatus::Approved.is_moderatable());
        assert!(!ReviewStatus::Rejected.is_moderatable());
    }

    fn sample() -> Recitation {
        Recitation {
            id: 1,
            user_id: Uuid::new_v4(),
            poem_id: 42,
            audio_order: 1,
            title: "سیمرغ".into(),
            artist_name: "حمیدرضا محمدی".into(),
            artist_url: String::new(),
            source_name: String::new(),
            source_url: String::new(),
            legacy_guid: Uuid::new_v4(),
            checksum: "abc".into(),
            audio_size_bytes: 10,
            filename_stem: "42-hrm".into(),
            sound_files_folder: "a".into(),
            local_audio_path: "/data/a/42-hrm.mp3".into(),
            local_manifest_path: "/data/a/x/42-hrm.xml".into(),
            review_status: ReviewStatus::Draft,
            reviewed_at: None,
            reviewer_id: None,
            review_message: None,
            sync_status: SyncStatus::NewItem,
            uploaded_at: Utc::now(),
            file_updated_at: Utc::now(),
        }
    }
}
