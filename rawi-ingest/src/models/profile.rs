//! Naming profiles: reusable attribution identities
//!
//! At most one profile per user carries the default flag; the default
//! profile names and attributes every recitation created by placement.

use rawi_common::language;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's attribution identity for new recitations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecitationProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Display name of the profile itself, unique per user
    pub name: String,
    pub artist_name: String,
    pub artist_url: String,
    pub source_name: String,
    pub source_url: String,
    /// Appended to `{poemId}-` when naming placed files
    pub file_suffix: String,
    pub is_default: bool,
}

impl RecitationProfile {
    /// Trim every user-entered field in place
    pub fn trim(&mut self) {
        self.name = self.name.trim().to_string();
        self.artist_name = self.artist_name.trim().to_string();
        self.artist_url = self.artist_url.trim().to_string();
        self.source_name = self.source_name.trim().to_string();
        self.source_url = self.source_url.trim().to_string();
        self.file_suffix = self.file_suffix.trim().to_string();
    }

    /// Field-level validation; returns the first problem found
    pub fn validation_error(&self) -> Option<String> {
        if self.name.is_empty() {
            return Some("Profile name must not be empty.".to_string());
        }
        if self.artist_name.chars().count() < 3 {
            return Some("Artist name must be at least three characters long.".to_string());
        }
        if let Some(c) = language::first_not_matching_char(
            &self.artist_name,
            language::PERSIAN_ALPHABET,
            language::NAME_SEPARATORS,
        ) {
            return Some(format!(
                "Artist name may only contain Persian letters and spaces. First invalid character: {}",
                c
            ));
        }
        if !self.artist_url.is_empty() && !language::is_absolute_http_url(&self.artist_url) {
            return Some("Artist URL is not a valid absolute http(s) URL.".to_string());
        }
        if !self.source_url.is_empty() && !language::is_absolute_http_url(&self.source_url) {
            return Some("Source URL is not a valid absolute http(s) URL.".to_string());
        }
        if !language::is_valid_file_suffix(&self.file_suffix) {
            return Some(
                "File suffix must be two to four lowercase ASCII letters.".to_string(),
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_profile() -> RecitationProfile {
        RecitationProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "نمایه".to_string(),
            artist_name: "حمیدرضا محمدی".to_string(),
            artist_url: "https://example.org/hrm".to_string(),
            source_name: "گنجور".to_string(),
            source_url: "https://example.org".to_string(),
            file_suffix: "hrm".to_string(),
            is_default: true,
        }
    }

    #[test]
    fn accepts_valid_profile() {
        assert_eq!(valid_profile().validation_error(), None);
    }

    #[test]
    fn rejects_short_artist_name() {
        let mut p = valid_profile();
        p.artist_name = "آب".to_string();
        assert!(p.validation_error().unwrap().contains("three characters"));
    }

    #[test]
    fn rejects_latin_artist_name() {
        let mut p = valid_profile();
        p.artist_name = "John Doe".to_string();
        assert!(p
            .validation_error()
            .unwrap()
            .contains("First invalid character"));
    }

    #[test]
    fn rejects_relative_urls() {
        let mut p = valid_profile();
        p.artist_url = "example.org/hrm".to_string();
        assert!(p.validation_error().unwrap().contains("Artist URL"));
    }

    #[test]
    fn empty_urls_are_allowed() {
        let mut p = valid_profile();
        p.artist_url = String::new();
        p.source_url = String::new();
        assert_eq!(p.validation_error(), None);
    }

    #[test]
    fn rejects_bad_suffix() {
        let mut p = valid_profile();
        p.file_suffix = "toolong".to_string();
        assert!(p.validation_error().unwrap().contains("suffix"));
    }

    #[test]
    fn trim_strips_whitespace() {
        let mut p = valid_profile();
        p.name = "  نمایه ".to_string();
        p.file_suffix = " hrm ".to_string();
        p.trim();
        assert_eq!(p.name, "نمایه");
        assert_eq!(p.file_suffix, "hrm");
    }
}
