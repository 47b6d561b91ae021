//! Domain models for the ingestion pipeline

pub mod profile;
pub mod recitation;
pub mod tracker;
pub mod upload_session;

pub use profile::RecitationProfile;
pub use recitation::{Recitation, ReviewStatus, SyncStatus};
pub use tracker::PublishingTracker;
pub use upload_session::{ProcessStatus, SessionKind, UploadSession, UploadSessionFile};
