//! Recitation manifest parsing
//!
//! Uploaded XML manifests describe one or more audio attachments: which
//! poem the narration belongs to, the checksum of the exact audio file
//! the timings were made against, a display title, and the sync
//! identifier assigned by the submitting client. Verse timing elements
//! in the same file are not needed for placement and are ignored.

use rawi_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

/// Title prefix the submitting client generates when the narrator never
/// entered one ("audio file ...")
const PLACEHOLDER_TITLE_PREFIX: &str = "فایل صوتی";

/// One audio attachment described by a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDescriptor {
    pub poem_id: i64,
    /// Display title; may be empty or a client-generated placeholder
    pub title: String,
    /// Checksum of the paired audio file's content
    pub checksum: String,
    /// Identifier assigned by the submitting client
    pub sync_guid: Uuid,
}

#[derive(Debug, Deserialize)]
struct PoemAudioList {
    #[serde(rename = "PoemAudio", default)]
    entries: Vec<PoemAudioXml>,
}

#[derive(Debug, Deserialize)]
struct PoemAudioXml {
    #[serde(rename = "PoemId")]
    poem_id: i64,
    #[serde(rename = "PoemTitle", default)]
    poem_title: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "FileCheckSum")]
    checksum: String,
    #[serde(rename = "SyncGuid")]
    sync_guid: String,
}

/// Parse manifest XML into audio descriptors
pub fn parse_manifest(xml: &str) -> Result<Vec<AudioDescriptor>> {
    let list: PoemAudioList = quick_xml::de::from_str(xml)
        .map_err(|e| Error::InvalidInput(format!("Malformed manifest: {}", e)))?;

    list.entries
        .into_iter()
        .map(|entry| {
            let sync_guid = Uuid::parse_str(entry.sync_guid.trim()).map_err(|e| {
                Error::InvalidInput(format!("Invalid sync identifier in manifest: {}", e))
            })?;

            // The client writes the poem title when it knows one and
            // falls back to a free-form description otherwise
            let title = match entry.poem_title {
                Some(t) if !t.trim().is_empty() => t.trim().to_string(),
                _ => entry
                    .description
                    .map(|d| d.trim().to_string())
                    .unwrap_or_default(),
            };

            Ok(AudioDescriptor {
                poem_id: entry.poem_id,
                title,
                checksum: entry.checksum.trim().to_string(),
                sync_guid,
            })
        })
        .collect()
}

/// Read and parse a manifest file
pub async fn load_manifest(path: &Path) -> Result<Vec<AudioDescriptor>> {
    let xml = tokio::fs::read_to_string(path).await?;
    parse_manifest(&xml)
}

/// Whether a title is worthless as a display name: empty, or the
/// client's generated placeholder
pub fn is_placeholder_title(title: &str) -> bool {
    let trimmed = title.trim();
    trimmed.is_empty() || trimmed.starts_with(PLACEHOLDER_TITLE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_entry() {
        let xml = r#"
            <PoemAudioList>
              <PoemAudio>
                <PoemId>42</PoemId>
                <PoemTitle>سیمرغ</PoemTitle>
                <FileCheckSum>abc123</FileCheckSum>
                <SyncGuid>9f8e1a34-5f3a-4f52-a1f0-2b8f6f0f8e11</SyncGuid>
              </PoemAudio>
            </PoemAudioList>
        "#;

        let descriptors = parse_manifest(xml).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].poem_id, 42);
        assert_eq!(descriptors[0].title, "سیمرغ");
        assert_eq!(descriptors[0].checksum, "abc123");
    }

    #[test]
    fn parses_multiple_entries_and_ignores_timing_elements() {
        let xml = r#"
            <PoemAudioList>
              <PoemAudio>
                <PoemId>1</PoemId>
                <FileCheckSum>aaa</FileCheckSum>
                <SyncGuid>9f8e1a34-5f3a-4f52-a1f0-2b8f6f0f8e11</SyncGuid>
                <SyncArray>
                  <SyncInfo><VerseOrder>0</VerseOrder><AudioMiliseconds>100</AudioMiliseconds></SyncInfo>
                </SyncArray>
              </PoemAudio>
              <PoemAudio>
                <PoemId>2</PoemId>
                <Description>خوانش دوم</Description>
                <FileCheckSum>bbb</FileCheckSum>
                <SyncGuid>6d33cbb3-64c5-4a10-93a7-7a55ee5ba3c0</SyncGuid>
              </PoemAudio>
            </PoemAudioList>
        "#;

        let descriptors = parse_manifest(xml).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].title, "خوانش دوم");
    }

    #[test]
    fn title_prefers_poem_title_over_description() {
        let xml = r#"
            <PoemAudioList>
              <PoemAudio>
                <PoemId>1</PoemId>
                <PoemTitle>عنوان</PoemTitle>
                <Description>توضیح</Description>
                <FileCheckSum>aaa</FileCheckSum>
                <SyncGuid>9f8e1a34-5f3a-4f52-a1f0-2b8f6f0f8e11</SyncGuid>
              </PoemAudio>
            </PoemAudioList>
        "#;

        let descriptors = parse_manifest(xml).unwrap();
        assert_eq!(descriptors[0].title, "عنوان");
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(parse_manifest("<PoemAudioList><PoemAudio>").is_err());
    }

    #[test]
    fn invalid_sync_guid_is_rejected() {
        let xml = r#"
            <PoemAudioList>
              <PoemAudio>
                <PoemId>1</PoemId>
                <FileCheckSum>aaa</FileCheckSum>
                <SyncGuid>not-a-guid</SyncGuid>
              </PoemAudio>
            </PoemAudioList>
        "#;
        assert!(parse_manifest(xml).is_err());
    }

    #[test]
    fn empty_list_yields_no_descriptors() {
        let descriptors = parse_manifest("<PoemAudioList></PoemAudioList>").unwrap();
        assert!(descriptors.is_empty());
    }

    #[test]
    fn placeholder_titles() {
        assert!(is_placeholder_title(""));
        assert!(is_placeholder_title("   "));
        assert!(is_placeholder_title("فایل صوتی ۱"));
        assert!(!is_placeholder_title("سیمرغ"));
    }
}
