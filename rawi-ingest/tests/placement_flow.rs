//! Pairing & placement engine integration tests

mod common;

use common::*;
use rawi_common::paging::PagingParams;
use rawi_ingest::db;
use rawi_ingest::models::{ReviewStatus, SessionKind, SyncStatus, UploadSession};
use rawi_ingest::queue::{Job, JobQueue};
use rawi_ingest::services::checksum::buffer_checksum;
use rawi_ingest::services::placement::{
    PlacementEngine, ALREADY_UPLOADED_MESSAGE, CHECKSUM_MISMATCH_MESSAGE, NO_COUNTERPART_MESSAGE,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    pool: sqlx::SqlitePool,
    config: Arc<rawi_common::config::RawiConfig>,
    engine: PlacementEngine,
    jobs: tokio::sync::mpsc::UnboundedReceiver<Job>,
    notifier: MockNotifier,
    user_id: Uuid,
    _root: TempDir,
}

async fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let pool = test_pool(root.path()).await;
    let config = Arc::new(test_config(root.path()));
    let (queue, jobs) = JobQueue::channel();
    let notifier = MockNotifier::default();

    let user_id = Uuid::new_v4();
    db::profiles::insert_profile(&pool, &default_profile(user_id, "hrm"))
        .await
        .unwrap();

    let engine = PlacementEngine::new(
        pool.clone(),
        config.clone(),
        queue,
        Arc::new(notifier.clone()),
    );

    Fixture {
        pool,
        config,
        engine,
        jobs,
        notifier,
        user_id,
        _root: root,
    }
}

async fn new_session(fixture: &Fixture, kind: SessionKind) -> UploadSession {
    let session = UploadSession::new(fixture.user_id, kind);
    db::sessions::insert_session(&fixture.pool, &session)
        .await
        .unwrap();
    db::sessions::finalize_session(&fixture.pool, session.id, chrono::Utc::now())
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn pairs_manifest_and_audio_into_draft_recitation() {
    let mut fixture = fixture().await;
    let session = new_session(&fixture, SessionKind::NewAudio).await;

    let audio_bytes = b"fake mp3 content for poem 42";
    let checksum = buffer_checksum(audio_bytes);
    let manifest = manifest_xml(&[(42, "سیمرغ", &checksum)]);

    let audio_file =
        add_stored_file(&fixture.pool, &fixture.config, session.id, "narr.mp3", audio_bytes).await;
    let manifest_file = add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "narr.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    // Exactly one draft recitation with the audio's checksum
    let (meta, items) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(meta.total_count, 1);
    let recitation = &items[0];
    assert_eq!(recitation.review_status, ReviewStatus::Draft);
    assert_eq!(recitation.sync_status, SyncStatus::NewItem);
    assert_eq!(recitation.checksum, checksum);
    assert_eq!(recitation.filename_stem, "42-hrm");
    assert_eq!(recitation.audio_size_bytes, audio_bytes.len() as i64);
    assert_eq!(recitation.artist_name, "حمیدرضا محمدی");
    assert_eq!(recitation.audio_order, 1);

    // Files moved into the repository
    let repo = fixture.config.storage.repository_path.join("a");
    assert_eq!(
        std::fs::read(repo.join("42-hrm.mp3")).unwrap(),
        audio_bytes
    );
    assert!(repo.join("x").join("42-hrm.xml").exists());

    // Temp files are gone regardless of outcome
    assert!(!Path::new(audio_file.temp_path.as_deref().unwrap()).exists());
    assert!(!Path::new(manifest_file.temp_path.as_deref().unwrap()).exists());

    // Per-file outcomes recorded
    let files = db::sessions::session_files(&fixture.pool, session.id)
        .await
        .unwrap();
    assert!(files.iter().all(|f| f.processed));
    assert!(files.iter().all(|f| f.result_message.is_empty()));

    // Session finished with full progress, owner notified
    let session = db::sessions::get_session(&fixture.pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.process_progress, 100);
    assert!(session.process_ended_at.is_some());
    assert_eq!(fixture.notifier.subjects_for(fixture.user_id).len(), 1);

    // New-audio sessions schedule no publish jobs
    assert!(fixture.jobs.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_audio_content_is_never_reingested() {
    let fixture = fixture().await;

    let audio_bytes = b"already known audio content";
    let checksum = buffer_checksum(audio_bytes);
    let existing = recitation_template(Uuid::new_v4(), 7, &checksum);
    db::recitations::insert_recitation(&fixture.pool, &existing)
        .await
        .unwrap();

    let session = new_session(&fixture, SessionKind::NewAudio).await;
    let manifest = manifest_xml(&[(7, "تکراری", &checksum)]);
    let audio_file =
        add_stored_file(&fixture.pool, &fixture.config, session.id, "dup.mp3", audio_bytes).await;
    let manifest_file = add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "dup.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    let (meta, _) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(meta.total_count, 1, "no duplicate recitation created");

    let files = db::sessions::session_files(&fixture.pool, session.id)
        .await
        .unwrap();
    let manifest_row = files.iter().find(|f| f.id == manifest_file.id).unwrap();
    assert!(!manifest_row.processed);
    assert_eq!(manifest_row.result_message, ALREADY_UPLOADED_MESSAGE);

    // The orphaned audio file ends as "no counterpart"
    let audio_row = files.iter().find(|f| f.id == audio_file.id).unwrap();
    assert_eq!(audio_row.result_message, NO_COUNTERPART_MESSAGE);
}

#[tokio::test]
async fn checksum_mismatch_is_explained_per_file() {
    let fixture = fixture().await;
    let session = new_session(&fixture, SessionKind::NewAudio).await;

    // Manifest references a checksum no uploaded audio has
    let manifest = manifest_xml(&[(9, "ناهمخوان", "deadbeef")]);
    add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "other.mp3",
        b"different audio bytes",
    )
    .await;
    let manifest_file = add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "sync.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    let (meta, _) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(meta.total_count, 0);

    let files = db::sessions::session_files(&fixture.pool, session.id)
        .await
        .unwrap();
    let manifest_row = files.iter().find(|f| f.id == manifest_file.id).unwrap();
    assert_eq!(manifest_row.result_message, CHECKSUM_MISMATCH_MESSAGE);
}

#[tokio::test]
async fn colliding_stems_get_numeric_tiebreaks() {
    let fixture = fixture().await;

    // Stems 42-hrm and 42-hrm1 are already taken on disk
    let repo = fixture.config.storage.repository_path.join("a");
    std::fs::create_dir_all(repo.join("x")).unwrap();
    std::fs::write(repo.join("42-hrm.mp3"), b"occupied").unwrap();
    std::fs::write(repo.join("x").join("42-hrm1.xml"), b"occupied").unwrap();

    let session = new_session(&fixture, SessionKind::NewAudio).await;
    let audio_bytes = b"new audio for poem 42";
    let checksum = buffer_checksum(audio_bytes);
    let manifest = manifest_xml(&[(42, "سیمرغ", &checksum)]);
    add_stored_file(&fixture.pool, &fixture.config, session.id, "n.mp3", audio_bytes).await;
    add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "n.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    let (_, items) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(items[0].filename_stem, "42-hrm2");
    assert!(repo.join("42-hrm2.mp3").exists());
}

#[tokio::test]
async fn replace_session_overwrites_in_place_and_schedules_republish() {
    let mut fixture = fixture().await;

    let old_bytes = b"original audio";
    let existing = seed_recitation_with_files(
        &fixture.pool,
        &fixture.config,
        recitation_template(fixture.user_id, 42, &buffer_checksum(old_bytes)),
        old_bytes,
    )
    .await;

    let new_bytes = b"re-recorded audio with fixes";
    let new_checksum = buffer_checksum(new_bytes);
    let session = new_session(&fixture, SessionKind::ReplaceAudio).await;
    let manifest = manifest_xml(&[(42, "سیمرغ", &new_checksum)]);
    add_stored_file(&fixture.pool, &fixture.config, session.id, "r.mp3", new_bytes).await;
    add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "r.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    // No new row; the existing one carries the new audio
    let (meta, _) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(meta.total_count, 1);

    let updated = db::recitations::get_recitation(&fixture.pool, existing.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.checksum, new_checksum);
    assert_eq!(updated.audio_size_bytes, new_bytes.len() as i64);
    assert_eq!(updated.sync_status, SyncStatus::FilesChanged);

    // The recitation's own local files were overwritten in place
    assert_eq!(
        std::fs::read(&existing.local_audio_path).unwrap(),
        new_bytes
    );

    // A replace-mode publish was scheduled for it
    assert_eq!(
        fixture.jobs.try_recv().unwrap(),
        Job::PublishRecitation {
            recitation_id: existing.id,
            replace: true,
        }
    );
}

#[tokio::test]
async fn placeholder_titles_fall_back_to_poem_title() {
    let fixture = fixture().await;
    db::poems::upsert_poem(&fixture.pool, 42, "عنوان شعر")
        .await
        .unwrap();

    let session = new_session(&fixture, SessionKind::NewAudio).await;
    let audio_bytes = b"audio with placeholder title";
    let checksum = buffer_checksum(audio_bytes);
    let manifest = manifest_xml(&[(42, "فایل صوتی ۱", &checksum)]);
    add_stored_file(&fixture.pool, &fixture.config, session.id, "p.mp3", audio_bytes).await;
    add_stored_file(
        &fixture.pool,
        &fixture.config,
        session.id,
        "p.xml",
        manifest.as_bytes(),
    )
    .await;

    fixture.engine.process_session(session.id).await.unwrap();

    let (_, items) =
        db::recitations::list_recitations(&fixture.pool, None, None, &PagingParams::default())
            .await
            .unwrap();
    assert_eq!(items[0].title, "عنوان شعر");
}
