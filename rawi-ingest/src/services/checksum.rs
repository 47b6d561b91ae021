//! Audio content checksums
//!
//! SHA-256 over the raw file bytes. Matching is exact: a manifest pairs
//! with an audio file only when this value equals the manifest's
//! recorded checksum.

use rawi_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Calculate the SHA-256 checksum of a file
///
/// Reads in 1 MiB chunks on a blocking thread so large audio files
/// don't stall the async runtime.
pub async fn file_checksum(file_path: &Path) -> Result<String> {
    let path = file_path.to_path_buf();
    tracing::debug!(path = %path.display(), "Calculating checksum");

    let hash = tokio::task::spawn_blocking(move || -> Result<String> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open file for checksum: {}", e),
            ))
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 1024 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read file for checksum: {}", e),
                ))
            })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| Error::Internal(format!("Checksum task failed: {}", e)))??;

    Ok(hash)
}

/// Checksum of an in-memory buffer; the manifest side of pairing
pub fn buffer_checksum(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn file_and_buffer_checksums_agree() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        let from_file = file_checksum(temp_file.path()).await.unwrap();
        assert_eq!(from_file.len(), 64);
        assert_eq!(from_file, buffer_checksum(b"test content"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let result = file_checksum(Path::new("/nonexistent/file.mp3")).await;
        assert!(result.is_err());
    }
}
