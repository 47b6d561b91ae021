//! Publish attempt trackers
//!
//! One row per publish attempt, including retries; prior attempts are
//! kept for history. A tracker is never mutated once finished.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Step-by-step progress record of one publish attempt
#[derive(Debug, Clone, Serialize)]
pub struct PublishingTracker {
    pub id: Uuid,
    pub recitation_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub manifest_copied: bool,
    pub audio_copied: bool,
    pub first_db_updated: bool,
    pub second_db_updated: bool,
    pub finished: bool,
    pub last_failure: Option<String>,
}

impl PublishingTracker {
    /// Start a fresh attempt with no steps completed
    pub fn start(recitation_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            recitation_id,
            started_at: Utc::now(),
            finished_at: None,
            manifest_copied: false,
            audio_copied: false,
            first_db_updated: false,
            second_db_updated: false,
            finished: false,
            last_failure: None,
        }
    }
}
