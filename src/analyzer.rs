use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z0-9_]+)").unwrap());

/// Count whitespace-delimited words
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Extract inline `#tags` in order of appearance.
/// Duplicates are kept: `"#a #b #a"` yields `["a", "b", "a"]`.
pub fn extract_tags(content: &str) -> Vec<String> {
    TAG_PATTERN
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .collect()
}
