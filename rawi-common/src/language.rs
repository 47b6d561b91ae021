//! Script validation helpers for attribution fields
//!
//! Artist names are restricted to the Persian alphabet plus plain and
//! zero-width spaces; filename suffixes to short lowercase ASCII runs.

/// The Persian alphabet, including the four letters absent from Arabic
pub const PERSIAN_ALPHABET: &str = "آاأإبپتثجچحخدذرزژسشصضطظعغفقکگلمنوؤهةیئيك";

/// Characters allowed in names besides alphabet letters:
/// plain space and zero-width non-joiner
pub const NAME_SEPARATORS: &str = " \u{200c}";

/// Scan `value` and return the first character not present in `alphabet`
/// or `extra`, or `None` when every character is acceptable.
pub fn first_not_matching_char(value: &str, alphabet: &str, extra: &str) -> Option<char> {
    value
        .chars()
        .find(|c| !alphabet.contains(*c) && !extra.contains(*c))
}

/// Whether `value` is entirely Persian letters and separators
pub fn is_persian_text(value: &str) -> bool {
    first_not_matching_char(value, PERSIAN_ALPHABET, NAME_SEPARATORS).is_none()
}

/// Filename suffix shape: 2 to 4 lowercase ASCII letters
pub fn is_valid_file_suffix(value: &str) -> bool {
    (2..=4).contains(&value.len()) && value.chars().all(|c| c.is_ascii_lowercase())
}

/// Whether `value` parses as an absolute http or https URL
pub fn is_absolute_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
