use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\x{0400}-\x{04FF}\s_-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Turn an arbitrary note or folder title into a file-system-safe name.
///
/// Keeps ASCII alphanumerics, Cyrillic letters, `-` and `_`; whitespace runs
/// become a single `-`. Falls back to `note-<epoch-ms>` when nothing survives.
pub fn sanitize_file_name(title: &str) -> String {
    let stripped = DISALLOWED.replace_all(title, "");
    let dashed = WHITESPACE_RUN.replace_all(&stripped, "-");
    let trimmed = dashed.trim_matches('-');

    if trimmed.is_empty() {
        format!("note-{}", chrono::Utc::now().timestamp_millis())
    } else {
        trimmed.to_string()
    }
}
