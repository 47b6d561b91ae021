//! External collaborators of the publish pipeline
//!
//! The remote file store, the two external catalog databases, and the
//! notification sink are reached through object-safe traits so the
//! publish worker can be exercised against test doubles. Production
//! implementations live here as well.

use async_trait::async_trait;
use rawi_common::config::RemoteConfig;
use rawi_common::{Error, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Recitation;
use crate::services::cache::CacheService;

/// Cache entry name of the remote store access token
const TOKEN_CACHE_ENTRY: &str = "remote-store-token";

/// The row both external catalogs receive for a newly published
/// recitation. The ogg fields are legacy columns kept empty.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRow {
    pub poem_id: i64,
    pub audio_order: i64,
    pub manifest_path: String,
    pub ogg_path: String,
    pub audio_url: String,
    pub title: String,
    pub artist_name: String,
    pub artist_url: String,
    pub source_name: String,
    pub source_url: String,
    pub legacy_guid: Uuid,
    pub checksum: String,
    pub audio_size_bytes: i64,
    pub ogg_size_bytes: i64,
}

impl CatalogRow {
    /// Build the catalog row for a recitation, resolving the public
    /// download URL against `audio_base_url`
    pub fn for_recitation(recitation: &Recitation, audio_base_url: &str) -> Self {
        Self {
            poem_id: recitation.poem_id,
            audio_order: recitation.audio_order,
            manifest_path: recitation.remote_manifest_path(),
            ogg_path: String::new(),
            audio_url: recitation.audio_url(audio_base_url),
            title: recitation.title.clone(),
            artist_name: recitation.artist_name.clone(),
            artist_url: recitation.artist_url.clone(),
            source_name: recitation.source_name.clone(),
            source_url: recitation.source_url.clone(),
            legacy_guid: recitation.legacy_guid,
            checksum: recitation.checksum.clone(),
            audio_size_bytes: recitation.audio_size_bytes,
            ogg_size_bytes: 0,
        }
    }
}

/// Path-addressed remote file store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a transport connection for one publish attempt
    async fn open(&self) -> Result<Box<dyn RemoteConnection>>;
}

/// One open connection to the remote file store
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Upload a local file to `remote_path`
    async fn put(&self, local_path: &Path, remote_path: &str, overwrite: bool) -> Result<()>;

    /// Release the connection; must be safe to call after failures
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// One external catalog database
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn insert(&self, row: &CatalogRow) -> Result<()>;
}

/// The messaging sink that informs users of pipeline outcomes
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, user_id: Uuid, subject: &str, body: &str) -> Result<()>;
}

// ---------------------------------------------------------------------
// Production implementations
// ---------------------------------------------------------------------

/// HTTP remote file store with token authentication
///
/// Tokens come from the store's login endpoint and live in the injected
/// cache under a well-known entry name until their configured TTL runs
/// out. Every transfer request carries a bounded timeout.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    config: RemoteConfig,
    cache: Arc<dyn CacheService>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl HttpRemoteStore {
    pub fn new(config: RemoteConfig, cache: Arc<dyn CacheService>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    /// Exchange the configured credentials for an access token
    async fn login(&self) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/login",
                self.config.base_url.trim_end_matches('/')
            ))
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| Error::Remote(format!("Remote store login failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "Remote store login returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Remote(format!("Malformed login response: {}", e)))?;

        Ok(body.token)
    }

    /// Log in and cache the fresh token; the named refresh step of the
    /// two-attempt transfer policy
    async fn refresh_token(&self) -> Result<String> {
        let token = self.login().await?;
        self.cache
            .set(
                TOKEN_CACHE_ENTRY,
                token.clone(),
                Duration::from_secs(self.config.token_ttl_secs),
            )
            .await;
        Ok(token)
    }

    async fn current_token(&self) -> Result<String> {
        if let Some(token) = self.cache.get(TOKEN_CACHE_ENTRY).await {
            return Ok(token);
        }
        self.refresh_token().await
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn open(&self) -> Result<Box<dyn RemoteConnection>> {
        let token = self.current_token().await?;
        Ok(Box::new(HttpRemoteConnection {
            store: self.clone(),
            token: RwLock::new(token),
        }))
    }
}

struct HttpRemoteConnection {
    store: HttpRemoteStore,
    token: RwLock<String>,
}

#[async_trait]
impl RemoteConnection for HttpRemoteConnection {
    async fn put(&self, local_path: &Path, remote_path: &str, overwrite: bool) -> Result<()> {
        // Two attempts: the second follows a token refresh after a 401
        for attempt in 0..2 {
            let token = self.token.read().await.clone();
            let data = tokio::fs::read(local_path).await?;

            let response = self
                .store
                .client
                .put(format!(
                    "{}{}",
                    self.store.config.base_url.trim_end_matches('/'),
                    remote_path
                ))
                .query(&[("overwrite", overwrite)])
                .bearer_auth(&token)
                .body(data)
                .send()
                .await
                .map_err(|e| Error::Remote(format!("Transfer of {} failed: {}", remote_path, e)))?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                tracing::debug!(remote_path, "Remote store rejected token, refreshing");
                let fresh = self.store.refresh_token().await?;
                *self.token.write().await = fresh;
                continue;
            }

            if !response.status().is_success() {
                return Err(Error::Remote(format!(
                    "Remote store returned {} for {}",
                    response.status(),
                    remote_path
                )));
            }

            return Ok(());
        }

        Err(Error::Remote(format!(
            "Transfer of {} failed after token refresh",
            remote_path
        )))
    }
}

/// Catalog over a SQL database reached through its own connection string
pub struct SqlCatalog {
    pool: SqlitePool,
    name: String,
}

impl SqlCatalog {
    /// Connect lazily so a briefly unreachable catalog doesn't block
    /// service startup; the first insert pays for the connection.
    pub fn connect_lazy(url: &str, name: &str) -> Result<Self> {
        let pool = SqlitePool::connect_lazy(url)
            .map_err(|e| Error::Remote(format!("{} catalog connection failed: {}", name, e)))?;
        Ok(Self {
            pool,
            name: name.to_string(),
        })
    }

    pub fn from_pool(pool: SqlitePool, name: &str) -> Self {
        Self {
            pool,
            name: name.to_string(),
        }
    }

    /// Create the catalog table when this process owns the schema
    /// (local deployments and tests; hosted catalogs ship their own)
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_recitations (
                poem_id INTEGER NOT NULL,
                audio_order INTEGER NOT NULL,
                manifest_path TEXT NOT NULL,
                ogg_path TEXT NOT NULL DEFAULT '',
                audio_url TEXT NOT NULL,
                title TEXT NOT NULL,
                artist_name TEXT NOT NULL,
                artist_url TEXT NOT NULL DEFAULT '',
                source_name TEXT NOT NULL DEFAULT '',
                source_url TEXT NOT NULL DEFAULT '',
                legacy_guid TEXT NOT NULL,
                checksum TEXT NOT NULL,
                audio_size_bytes INTEGER NOT NULL,
                ogg_size_bytes INTEGER NOT NULL DEFAULT 0,
                published_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn insert(&self, row: &CatalogRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_recitations (
                poem_id, audio_order, manifest_path, ogg_path, audio_url,
                title, artist_name, artist_url, source_name, source_url,
                legacy_guid, checksum, audio_size_bytes, ogg_size_bytes,
                published_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(row.poem_id)
        .bind(row.audio_order)
        .bind(&row.manifest_path)
        .bind(&row.ogg_path)
        .bind(&row.audio_url)
        .bind(&row.title)
        .bind(&row.artist_name)
        .bind(&row.artist_url)
        .bind(&row.source_name)
        .bind(&row.source_url)
        .bind(row.legacy_guid.to_string())
        .bind(&row.checksum)
        .bind(row.audio_size_bytes)
        .bind(row.ogg_size_bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Remote(format!("{} catalog insert failed: {}", self.name, e)))?;

        Ok(())
    }
}

/// Notification sink over HTTP. An empty endpoint disables delivery,
/// which local deployments use.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn push(&self, user_id: Uuid, subject: &str, body: &str) -> Result<()> {
        if self.endpoint.is_empty() {
            tracing::debug!(user_id = %user_id, subject, "Notification delivery disabled");
            return Ok(());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "user_id": user_id,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| Error::Remote(format!("Notification push failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "Notification sink returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
