//! Shared helpers and collaborator doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rawi_common::config::RawiConfig;
use rawi_common::{Error, Result};
use rawi_ingest::db;
use rawi_ingest::models::{Recitation, ReviewStatus, SyncStatus, UploadSessionFile};
use rawi_ingest::services::remote::{
    Catalog, CatalogRow, Notifier, RemoteConnection, RemoteStore,
};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// File-backed test database: background workers open multiple pooled
/// connections, which `:memory:` databases cannot share
pub async fn test_pool(root: &Path) -> SqlitePool {
    db::init_database_pool(&root.join("rawi-test.db"))
        .await
        .unwrap()
}

pub fn test_config(root: &Path) -> RawiConfig {
    let mut config = RawiConfig::default();
    config.storage.temp_upload_path = root.join("tmp");
    config.storage.repository_path = root.join("repo");
    config.storage.sound_files_folder = "a".to_string();
    config.remote.root_path = "/srv/audio".to_string();
    config.catalog.audio_base_url = "https://cdn.example.org".to_string();
    config
}

// ---------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------

/// Remote store double recording every upload path
#[derive(Clone, Default)]
pub struct MockRemote {
    pub uploads: Arc<Mutex<Vec<String>>>,
    pub fail_open: Arc<AtomicBool>,
    pub open_count: Arc<AtomicUsize>,
    pub close_count: Arc<AtomicUsize>,
}

impl MockRemote {
    pub fn uploaded_paths(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

struct MockConnection {
    remote: MockRemote,
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn open(&self) -> Result<Box<dyn RemoteConnection>> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Remote("remote store unreachable".to_string()));
        }
        Ok(Box::new(MockConnection {
            remote: self.clone(),
        }))
    }
}

#[async_trait]
impl RemoteConnection for MockConnection {
    async fn put(&self, local_path: &Path, remote_path: &str, _overwrite: bool) -> Result<()> {
        if !local_path.exists() {
            return Err(Error::Remote(format!(
                "missing local file {}",
                local_path.display()
            )));
        }
        self.remote
            .uploads
            .lock()
            .unwrap()
            .push(remote_path.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.remote.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Catalog double recording inserted rows; can be switched to fail
#[derive(Clone, Default)]
pub struct MockCatalog {
    pub rows: Arc<Mutex<Vec<CatalogRow>>>,
    pub fail: Arc<AtomicBool>,
}

impl MockCatalog {
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn insert(&self, row: &CatalogRow) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Remote("catalog unavailable".to_string()));
        }
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }
}

/// Notifier double recording (user, subject) pairs
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub messages: Arc<Mutex<Vec<(Uuid, String)>>>,
}

impl MockNotifier {
    pub fn subjects_for(&self, user: Uuid) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn push(&self, user_id: Uuid, subject: &str, _body: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((user_id, subject.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Data helpers
// ---------------------------------------------------------------------

/// A recitation row template; callers adjust fields before inserting
pub fn recitation_template(user_id: Uuid, poem_id: i64, checksum: &str) -> Recitation {
    let now = Utc::now();
    Recitation {
        id: 0,
        user_id,
        poem_id,
        audio_order: 1,
        title: "سیمرغ".to_string(),
        artist_name: "حمیدرضا محمدی".to_string(),
        artist_url: String::new(),
        source_name: String::new(),
        source_url: String::new(),
        legacy_guid: Uuid::new_v4(),
        checksum: checksum.to_string(),
        audio_size_bytes: 16,
        filename_stem: format!("{}-hrm", poem_id),
        sound_files_folder: "a".to_string(),
        local_audio_path: String::new(),
        local_manifest_path: String::new(),
        review_status: ReviewStatus::Draft,
        reviewed_at: None,
        reviewer_id: None,
        review_message: None,
        sync_status: SyncStatus::NewItem,
        uploaded_at: now,
        file_updated_at: now,
    }
}

/// Insert a recitation whose local files really exist under the
/// configured repository, returning the stored row
pub async fn seed_recitation_with_files(
    pool: &SqlitePool,
    config: &RawiConfig,
    mut recitation: Recitation,
    audio_bytes: &[u8],
) -> Recitation {
    let audio_dir = config
        .storage
        .repository_path
        .join(&config.storage.sound_files_folder);
    let manifest_dir = audio_dir.join("x");
    std::fs::create_dir_all(&manifest_dir).unwrap();

    let audio_path = audio_dir.join(format!("{}.mp3", recitation.filename_stem));
    let manifest_path = manifest_dir.join(format!("{}.xml", recitation.filename_stem));
    std::fs::write(&audio_path, audio_bytes).unwrap();
    std::fs::write(&manifest_path, b"<PoemAudioList></PoemAudioList>").unwrap();

    recitation.local_audio_path = audio_path.display().to_string();
    recitation.local_manifest_path = manifest_path.display().to_string();
    recitation.audio_size_bytes = audio_bytes.len() as i64;

    let id = db::recitations::insert_recitation(pool, &recitation)
        .await
        .unwrap();
    db::recitations::get_recitation(pool, id).await.unwrap().unwrap()
}

pub fn default_profile(user_id: Uuid, suffix: &str) -> rawi_ingest::models::RecitationProfile {
    rawi_ingest::models::RecitationProfile {
        id: Uuid::new_v4(),
        user_id,
        name: "نمایهٔ پیش‌فرض".to_string(),
        artist_name: "حمیدرضا محمدی".to_string(),
        artist_url: "https://example.org/hrm".to_string(),
        source_name: "گنجور".to_string(),
        source_url: "https://example.org".to_string(),
        file_suffix: suffix.to_string(),
        is_default: true,
    }
}

/// Manifest XML describing `(poem_id, title, checksum)` attachments
pub fn manifest_xml(entries: &[(i64, &str, &str)]) -> String {
    let mut xml = String::from("<PoemAudioList>\n");
    for (poem_id, title, checksum) in entries {
        xml.push_str(&format!(
            "  <PoemAudio>\n    <PoemId>{}</PoemId>\n    <PoemTitle>{}</PoemTitle>\n    \
             <FileCheckSum>{}</FileCheckSum>\n    <SyncGuid>{}</SyncGuid>\n  </PoemAudio>\n",
            poem_id,
            title,
            checksum,
            Uuid::new_v4()
        ));
    }
    xml.push_str("</PoemAudioList>\n");
    xml
}

/// Write a session file into the temp area and record its row
pub async fn add_stored_file(
    pool: &SqlitePool,
    config: &RawiConfig,
    session_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> UploadSessionFile {
    std::fs::create_dir_all(&config.storage.temp_upload_path).unwrap();
    let target = config
        .storage
        .temp_upload_path
        .join(format!("{}-{}", Uuid::new_v4(), filename));
    std::fs::write(&target, bytes).unwrap();

    let mut file = UploadSessionFile::new(
        session_id,
        "file".to_string(),
        filename.to_string(),
        "application/octet-stream".to_string(),
        bytes.len() as i64,
    );
    file.temp_path = Some(target.display().to_string());

    db::sessions::insert_file(pool, &file).await.unwrap();
    file
}

/// Poll `condition` until it holds or a timeout elapses
pub async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within timeout"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
