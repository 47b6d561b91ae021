//! Pairing and placement of uploaded files
//!
//! The background job behind session finalization. Pairs manifest
//! entries with uploaded audio files by content checksum, moves matched
//! pairs into the permanent repository under collision-free names, and
//! creates or replaces recitation records. Every per-file problem is
//! recorded on that file's result message; the job itself only fails on
//! infrastructure errors (the worker logs those).

use chrono::Utc;
use rawi_common::config::RawiConfig;
use rawi_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::db;
use crate::models::upload_session::PENDING_FILE_MESSAGE;
use crate::models::{
    Recitation, ReviewStatus, SessionKind, SyncStatus, UploadSession, UploadSessionFile,
};
use crate::queue::{Job, JobQueue};
use crate::services::remote::Notifier;
use crate::services::{checksum, manifest};

/// Result message when the audio content is already in the catalog
pub const ALREADY_UPLOADED_MESSAGE: &str =
    "An identical audio file has already been uploaded.";

/// Result message when no uploaded audio matches the manifest checksum
pub const CHECKSUM_MISMATCH_MESSAGE: &str =
    "No uploaded audio file matches this manifest (note that filenames do not matter: the audio \
     file must be exactly the one the timings were synced against; if it was replaced afterwards \
     its checksum no longer matches the manifest).";

/// Result message for files nothing referenced
pub const NO_COUNTERPART_MESSAGE: &str =
    "No matching manifest or audio counterpart was found for this file.";

/// Result message when the owner lost their default profile mid-flight
const MISSING_PROFILE_MESSAGE: &str =
    "The session owner no longer has a default naming profile.";

/// Pairing & placement engine, one instance per job run
pub struct PlacementEngine {
    db: SqlitePool,
    config: Arc<RawiConfig>,
    queue: JobQueue,
    notifier: Arc<dyn Notifier>,
}

impl PlacementEngine {
    pub fn new(
        db: SqlitePool,
        config: Arc<RawiConfig>,
        queue: JobQueue,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            queue,
            notifier,
        }
    }

    /// Process one finalized upload session end to end
    pub async fn process_session(&self, session_id: Uuid) -> Result<()> {
        let Some(session) = db::sessions::get_session(&self.db, session_id).await? else {
            tracing::warn!(session_id = %session_id, "Upload session not found, skipping");
            return Ok(());
        };

        tracing::info!(session_id = %session_id, kind = ?session.kind, "Processing upload session");
        db::sessions::mark_processing_started(&self.db, session_id).await?;

        let files = db::sessions::session_files(&self.db, session_id).await?;
        let total = files.len().max(1) as f64;
        let mut processed = 0usize;

        // Pass 1: checksum every stored audio file
        let mut audio_files = Vec::new();
        for file in files.iter().filter(|f| f.extension() == "mp3") {
            processed += 1;
            let Some(temp_path) = file.temp_path.as_deref() else {
                continue;
            };

            match checksum::file_checksum(Path::new(temp_path)).await {
                Ok(sum) => {
                    db::sessions::set_file_checksum(&self.db, file.id, &sum).await?;
                    let mut file = file.clone();
                    file.checksum = Some(sum);
                    audio_files.push(file);
                }
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "Checksum computation failed");
                    db::sessions::record_file_outcome(
                        &self.db,
                        file.id,
                        false,
                        &format!("Checksum computation failed: {}", e),
                    )
                    .await?;
                }
            }

            db::sessions::update_progress(
                &self.db,
                session_id,
                (processed as f64 / total * 100.0) as i64,
            )
            .await?;
        }

        // Session initiation guarantees a default profile, but it may
        // have been deleted while files were still uploading
        let profile = db::profiles::default_profile(&self.db, session.user_id).await?;

        // Pass 2: pair and place every manifest
        for file in files.iter().filter(|f| f.extension() == "xml") {
            if file.temp_path.is_none() {
                processed += 1;
                continue;
            }

            let outcome = match &profile {
                Some(profile) => {
                    self.place_manifest(&session, profile, file, &audio_files)
                        .await
                }
                None => {
                    db::sessions::record_file_outcome(
                        &self.db,
                        file.id,
                        false,
                        MISSING_PROFILE_MESSAGE,
                    )
                    .await
                }
            };

            if let Err(e) = outcome {
                tracing::warn!(file_id = %file.id, error = %e, "Manifest processing failed");
                db::sessions::record_file_outcome(
                    &self.db,
                    file.id,
                    false,
                    &format!("Post-processing failed: {}", e),
                )
                .await?;
            }

            processed += 1;
            db::sessions::update_progress(
                &self.db,
                session_id,
                (processed as f64 / total * 100.0) as i64,
            )
            .await?;
        }

        self.finish_session(&session).await?;

        Ok(())
    }

    /// Place every audio attachment one manifest describes
    async fn place_manifest(
        &self,
        session: &UploadSession,
        profile: &crate::models::RecitationProfile,
        manifest_file: &UploadSessionFile,
        audio_files: &[UploadSessionFile],
    ) -> Result<()> {
        let temp_path = manifest_file.temp_path.as_deref().unwrap_or_default();
        let descriptors = manifest::load_manifest(Path::new(temp_path)).await?;

        for descriptor in descriptors {
            // Idempotent dedup: identical audio content is never re-ingested
            if db::recitations::checksum_exists(&self.db, &descriptor.checksum).await? {
                tracing::info!(
                    poem_id = descriptor.poem_id,
                    checksum = %descriptor.checksum,
                    "Audio content already in catalog, skipping"
                );
                db::sessions::record_file_outcome(
                    &self.db,
                    manifest_file.id,
                    false,
                    ALREADY_UPLOADED_MESSAGE,
                )
                .await?;
                continue;
            }

            // Locate the audio counterpart before touching any file
            let Some(audio_file) = audio_files
                .iter()
                .find(|f| f.checksum.as_deref() == Some(descriptor.checksum.as_str()))
            else {
                db::sessions::record_file_outcome(
                    &self.db,
                    manifest_file.id,
                    false,
                    CHECKSUM_MISMATCH_MESSAGE,
                )
                .await?;
                continue;
            };

            let audio_dir = self
                .config
                .storage
                .repository_path
                .join(&self.config.storage.sound_files_folder);
            let manifest_dir = audio_dir.join("x");
            std::fs::create_dir_all(&audio_dir)?;
            std::fs::create_dir_all(&manifest_dir)?;

            let stem = available_stem(
                &audio_dir,
                &manifest_dir,
                descriptor.poem_id,
                &profile.file_suffix,
            );
            let local_audio = audio_dir.join(format!("{}.mp3", stem));
            let local_manifest = manifest_dir.join(format!("{}.xml", stem));

            move_file(Path::new(temp_path), &local_manifest)?;
            move_file(
                Path::new(audio_file.temp_path.as_deref().unwrap_or_default()),
                &local_audio,
            )?;
            let audio_size = std::fs::metadata(&local_audio)?.len() as i64;

            let mut replaced = false;
            if session.kind == SessionKind::ReplaceAudio {
                if let Some(existing) = db::recitations::replacement_target(
                    &self.db,
                    session.user_id,
                    descriptor.poem_id,
                    &profile.artist_name,
                )
                .await?
                {
                    // Overwrite the prior recitation's files in place;
                    // the freshly placed copies move once more
                    move_file(&local_manifest, Path::new(&existing.local_manifest_path))?;
                    move_file(&local_audio, Path::new(&existing.local_audio_path))?;

                    db::recitations::apply_replacement(
                        &self.db,
                        existing.id,
                        &descriptor.checksum,
                        audio_size,
                        Utc::now(),
                    )
                    .await?;

                    tracing::info!(
                        recitation_id = existing.id,
                        poem_id = descriptor.poem_id,
                        "Replaced recitation audio, scheduling republish"
                    );
                    self.queue.enqueue(Job::PublishRecitation {
                        recitation_id: existing.id,
                        replace: true,
                    });
                    replaced = true;
                }
            }

            if !replaced {
                let recitation = self
                    .build_new_recitation(
                        session,
                        profile,
                        &descriptor,
                        &stem,
                        &local_audio,
                        &local_manifest,
                        audio_size,
                    )
                    .await?;
                let id = db::recitations::insert_recitation(&self.db, &recitation).await?;
                tracing::info!(
                    recitation_id = id,
                    poem_id = descriptor.poem_id,
                    stem = %stem,
                    "Created draft recitation"
                );
            }

            db::sessions::record_file_outcome(&self.db, manifest_file.id, true, "").await?;
            db::sessions::record_file_outcome(&self.db, audio_file.id, true, "").await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_new_recitation(
        &self,
        session: &UploadSession,
        profile: &crate::models::RecitationProfile,
        descriptor: &manifest::AudioDescriptor,
        stem: &str,
        local_audio: &Path,
        local_manifest: &Path,
        audio_size: i64,
    ) -> Result<Recitation> {
        // Keep the client-assigned identifier unless it is already taken
        let mut legacy_guid = descriptor.sync_guid;
        while db::recitations::legacy_guid_exists(&self.db, legacy_guid).await? {
            legacy_guid = Uuid::new_v4();
        }

        let mut title = descriptor.title.clone();
        if manifest::is_placeholder_title(&title) {
            if let Some(poem_title) = db::poems::poem_title(&self.db, descriptor.poem_id).await? {
                title = poem_title;
            }
        }

        let uploaded_at = session.upload_ended_at.unwrap_or_else(Utc::now);

        Ok(Recitation {
            id: 0,
            user_id: session.user_id,
            poem_id: descriptor.poem_id,
            audio_order: db::recitations::next_audio_order(&self.db, descriptor.poem_id).await?,
            title,
            artist_name: profile.artist_name.clone(),
            artist_url: profile.artist_url.clone(),
            source_name: profile.source_name.clone(),
            source_url: profile.source_url.clone(),
            legacy_guid,
            checksum: descriptor.checksum.clone(),
            audio_size_bytes: audio_size,
            filename_stem: stem.to_string(),
            sound_files_folder: self.config.storage.sound_files_folder.clone(),
            local_audio_path: local_audio.display().to_string(),
            local_manifest_path: local_manifest.display().to_string(),
            review_status: ReviewStatus::Draft,
            reviewed_at: None,
            reviewer_id: None,
            review_message: None,
            sync_status: SyncStatus::NewItem,
            uploaded_at,
            file_updated_at: uploaded_at,
        })
    }

    /// Final bookkeeping: default outcomes, temp cleanup, progress,
    /// completion notification
    async fn finish_session(&self, session: &UploadSession) -> Result<()> {
        let files = db::sessions::session_files(&self.db, session.id).await?;

        for file in &files {
            if !file.processed && file.result_message == PENDING_FILE_MESSAGE {
                db::sessions::record_file_outcome(
                    &self.db,
                    file.id,
                    false,
                    NO_COUNTERPART_MESSAGE,
                )
                .await?;
            }

            // Temporary files go regardless of outcome
            if let Some(temp) = &file.temp_path {
                let path = Path::new(temp);
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to delete temp file");
                    }
                }
            }
        }

        db::sessions::mark_processing_finished(&self.db, session.id).await?;
        tracing::info!(session_id = %session.id, "Upload session processing finished");

        if let Err(e) = self
            .notifier
            .push(
                session.user_id,
                "Recitation processing finished",
                "Processing of your recently uploaded recitations is complete. Review the \
                 per-file results and, when everything looks right, request moderation.",
            )
            .await
        {
            tracing::warn!(user_id = %session.user_id, error = %e, "Completion notification failed");
        }

        Ok(())
    }
}

/// First free `{poemId}-{suffix}` stem, appending an incrementing
/// numeric tiebreak while either target file already exists
fn available_stem(audio_dir: &Path, manifest_dir: &Path, poem_id: i64, suffix: &str) -> String {
    let mut stem = format!("{}-{}", poem_id, suffix);
    let mut tiebreak = 1;
    while audio_dir.join(format!("{}.mp3", stem)).exists()
        || manifest_dir.join(format!("{}.xml", stem)).exists()
    {
        stem = format!("{}-{}{}", poem_id, suffix, tiebreak);
        tiebreak += 1;
    }
    stem
}

/// Move a file, falling back to copy+delete across filesystems.
/// Overwrites an existing target.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let audio_dir = root.path().join("a");
        let manifest_dir = audio_dir.join("x");
        std::fs::create_dir_all(&manifest_dir).unwrap();
        (root, audio_dir, manifest_dir)
    }

    #[test]
    fn stem_without_collision_is_bare() {
        let (_root, audio_dir, manifest_dir) = dirs();
        assert_eq!(available_stem(&audio_dir, &manifest_dir, 42, "ab"), "42-ab");
    }

    #[test]
    fn stem_tiebreak_increments_until_free() {
        let (_root, audio_dir, manifest_dir) = dirs();
        std::fs::write(audio_dir.join("42-ab.mp3"), b"x").unwrap();
        std::fs::write(manifest_dir.join("42-ab1.xml"), b"x").unwrap();

        assert_eq!(available_stem(&audio_dir, &manifest_dir, 42, "ab"), "42-ab2");
    }

    #[test]
    fn either_extension_reserves_the_stem() {
        let (_root, audio_dir, manifest_dir) = dirs();
        std::fs::write(manifest_dir.join("42-ab.xml"), b"x").unwrap();

        assert_eq!(available_stem(&audio_dir, &manifest_dir, 42, "ab"), "42-ab1");
    }

    #[test]
    fn move_file_replaces_target() {
        let (_root, audio_dir, _) = dirs();
        let from = audio_dir.join("from.mp3");
        let to = audio_dir.join("to.mp3");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }
}
