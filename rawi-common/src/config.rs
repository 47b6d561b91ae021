//! Configuration loading and path resolution
//!
//! Resolution priority order:
//! 1. `RAWI_CONFIG` environment variable (explicit file path)
//! 2. `~/.config/rawi/config.toml`
//! 3. `/etc/rawi/config.toml` (Linux)
//! 4. Compiled per-OS defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Local file layout: temp upload area, recitation repository, database
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Scratch area for uploaded files awaiting placement
    #[serde(default = "default_temp_upload_path")]
    pub temp_upload_path: PathBuf,
    /// Root of the permanent local recitation repository
    #[serde(default = "default_repository_path")]
    pub repository_path: PathBuf,
    /// Subfolder of the repository new recitations are placed into
    #[serde(default = "default_sound_files_folder")]
    pub sound_files_folder: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

/// Remote file store endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Path prefix prepended to every remote target path
    #[serde(default)]
    pub root_path: String,
    /// Bounded timeout around each transfer request
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    /// Lifetime of a cached access token
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// External catalog databases (two, with independent credentials)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default)]
    pub primary_url: String,
    #[serde(default)]
    pub secondary_url: String,
    /// Public base URL audio files are served from once published
    #[serde(default)]
    pub audio_base_url: String,
}

/// Notification sink endpoint
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    #[serde(default)]
    pub endpoint: String,
}

/// Background worker pool sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5731
}

fn default_remote_timeout_secs() -> u64 {
    30
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_workers() -> usize {
    4
}

fn default_sound_files_folder() -> String {
    "a".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rawi"))
        .unwrap_or_else(|| PathBuf::from("./rawi_data"))
}

fn default_temp_upload_path() -> PathBuf {
    data_dir().join("tmp")
}

fn default_repository_path() -> PathBuf {
    data_dir().join("recitations")
}

fn default_database_path() -> PathBuf {
    data_dir().join("rawi.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_upload_path: default_temp_upload_path(),
            repository_path: default_repository_path(),
            sound_files_folder: default_sound_files_folder(),
            database_path: default_database_path(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            root_path: String::new(),
            timeout_secs: default_remote_timeout_secs(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl RawiConfig {
    /// Load configuration following the priority order in the module docs.
    /// Falls back to compiled defaults when no config file is present.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("RAWI_CONFIG") {
            return Self::from_file(&PathBuf::from(path));
        }

        if let Some(user_config) = dirs::config_dir().map(|d| d.join("rawi").join("config.toml")) {
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let system_config = PathBuf::from("/etc/rawi/config.toml");
        if system_config.exists() {
            return Self::from_file(&system_config);
        }

        tracing::info!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Parse configuration from a specific TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = RawiConfig::default();
        assert_eq!(config.server.port, 5731);
        assert_eq!(config.queue.workers, 4);
        assert_eq!(config.storage.sound_files_folder, "a");
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            port = 8080

            [storage]
            temp_upload_path = "/tmp/rawi-upload"
            repository_path = "/srv/recitations"

            [catalog]
            primary_url = "sqlite:///srv/catalog1.db"
            secondary_url = "sqlite:///srv/catalog2.db"
            "#
        )
        .unwrap();

        let config = RawiConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(
            config.storage.temp_upload_path,
            PathBuf::from("/tmp/rawi-upload")
        );
        assert_eq!(config.catalog.primary_url, "sqlite:///srv/catalog1.db");
        // Untouched sections keep defaults
        assert_eq!(config.queue.workers, 4);
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server]\nprot = 8080\n").unwrap();
        assert!(RawiConfig::from_file(&file.path().to_path_buf()).is_err());
    }
}
