//! Durable publication of approved recitations
//!
//! One invocation publishes one recitation: transfer both local files to
//! the remote store, then (for brand-new items) replicate the catalog
//! row into the two external databases. Every completed step is
//! persisted on a tracker row before the next one starts, so an attempt
//! that dies mid-way leaves an exact record of how far it got. A failed
//! attempt records its failure text and leaves the recitation's sync
//! status untouched, which is precisely what keeps it visible to the
//! retry scan.

use rawi_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::db;
use crate::db::trackers::TrackerStep;
use crate::models::{PublishingTracker, Recitation, SyncStatus};
use crate::services::remote::{Catalog, CatalogRow, Notifier, RemoteConnection, RemoteStore};

/// Publish worker
pub struct Publisher {
    db: SqlitePool,
    remote: Arc<dyn RemoteStore>,
    primary_catalog: Arc<dyn Catalog>,
    secondary_catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    remote_root: String,
    audio_base_url: String,
}

impl Publisher {
    pub fn new(
        db: SqlitePool,
        remote: Arc<dyn RemoteStore>,
        primary_catalog: Arc<dyn Catalog>,
        secondary_catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        remote_root: String,
        audio_base_url: String,
    ) -> Self {
        Self {
            db,
            remote,
            primary_catalog,
            secondary_catalog,
            notifier,
            remote_root,
            audio_base_url,
        }
    }

    /// Run one publish attempt. `replace` skips the catalog inserts:
    /// the external databases already carry the row, only files changed.
    pub async fn publish(&self, recitation_id: i64, replace: bool) -> Result<()> {
        let Some(recitation) = db::recitations::get_recitation(&self.db, recitation_id).await?
        else {
            tracing::warn!(recitation_id, "Recitation not found, skipping publish");
            return Ok(());
        };

        // Catalog inserts a crashed attempt already made must not repeat
        let prior_db_steps = db::trackers::completed_db_steps(&self.db, recitation_id).await?;

        let tracker = PublishingTracker::start(recitation_id);
        db::trackers::insert_tracker(&self.db, &tracker).await?;
        tracing::info!(
            recitation_id,
            replace,
            tracker_id = %tracker.id,
            "Publishing recitation"
        );

        if let Err(e) = self
            .run_attempt(&tracker, &recitation, replace, prior_db_steps)
            .await
        {
            // Sync status stays untouched: the recitation remains
            // eligible for retry
            tracing::warn!(recitation_id, error = %e, "Publish attempt failed");
            db::trackers::record_failure(&self.db, tracker.id, &e.to_string()).await?;
        }

        Ok(())
    }

    async fn run_attempt(
        &self,
        tracker: &PublishingTracker,
        recitation: &Recitation,
        replace: bool,
        prior_db_steps: (bool, bool),
    ) -> Result<()> {
        let connection = self.remote.open().await?;

        let outcome = self
            .transfer_and_sync(tracker, recitation, replace, prior_db_steps, connection.as_ref())
            .await;

        // The connection is released on success and failure alike
        if let Err(e) = connection.close().await {
            tracing::warn!(error = %e, "Failed to release remote connection");
        }

        outcome
    }

    async fn transfer_and_sync(
        &self,
        tracker: &PublishingTracker,
        recitation: &Recitation,
        replace: bool,
        prior_db_steps: (bool, bool),
        connection: &dyn RemoteConnection,
    ) -> Result<()> {
        let root = self.remote_root.trim_end_matches('/');

        connection
            .put(
                Path::new(&recitation.local_manifest_path),
                &format!("{}{}", root, recitation.remote_manifest_path()),
                true,
            )
            .await?;
        db::trackers::mark_step(&self.db, tracker.id, TrackerStep::ManifestCopied).await?;

        connection
            .put(
                Path::new(&recitation.local_audio_path),
                &format!("{}{}", root, recitation.remote_audio_path()),
                true,
            )
            .await?;
        db::trackers::mark_step(&self.db, tracker.id, TrackerStep::AudioCopied).await?;

        if !replace {
            let row = CatalogRow::for_recitation(recitation, &self.audio_base_url);

            if !prior_db_steps.0 {
                self.primary_catalog.insert(&row).await?;
            }
            db::trackers::mark_step(&self.db, tracker.id, TrackerStep::FirstDbUpdated).await?;

            if !prior_db_steps.1 {
                self.secondary_catalog.insert(&row).await?;
            }
            db::trackers::mark_step(&self.db, tracker.id, TrackerStep::SecondDbUpdated).await?;
        }

        db::recitations::set_sync_status(&self.db, recitation.id, SyncStatus::Synchronized)
            .await?;

        if let Err(e) = self
            .notifier
            .push(
                recitation.user_id,
                "Recitation published",
                "Your submitted recitation has been published.",
            )
            .await
        {
            tracing::warn!(user_id = %recitation.user_id, error = %e, "Publish notification failed");
        }

        db::trackers::mark_finished(&self.db, tracker.id).await?;
        tracing::info!(recitation_id = recitation.id, "Recitation published");

        Ok(())
    }

    /// Rescan approved recitations whose remote state is stale and run a
    /// fresh attempt for each. Idempotent: synchronized items are out of
    /// the scan set. Returns how many were resubmitted.
    pub async fn retry_pending(&self) -> Result<usize> {
        let pending = db::recitations::pending_publish(&self.db).await?;
        let count = pending.len();

        for recitation in pending {
            // A replaced recitation republishes its files only
            let replace = recitation.sync_status == SyncStatus::FilesChanged;
            self.publish(recitation.id, replace).await?;
        }

        Ok(count)
    }
}
