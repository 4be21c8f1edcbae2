use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::note::title_from_path;
use crate::traverse::{walk_workspace, EntryKind};

/// Number of characters of note content returned with each hit
pub const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub note_id: String,
    pub title: String,
    /// Start of the note, not centered on the match
    pub content: String,
    pub matches: usize,
}

/// Case-insensitive literal matcher for one query
struct QueryMatcher {
    needle: String,
    pattern: Option<Regex>,
}

impl QueryMatcher {
    fn new(query: &str) -> Self {
        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .map_err(|e| log::warn!("[search] Falling back to plain counting: {}", e))
            .ok();
        Self {
            needle: query.to_lowercase(),
            pattern,
        }
    }

    fn is_match(&self, content: &str) -> bool {
        content.to_lowercase().contains(&self.needle)
    }

    fn count(&self, content: &str) -> usize {
        match &self.pattern {
            Some(re) => re.find_iter(content).count(),
            None => content.to_lowercase().matches(&self.needle).count(),
        }
    }
}

fn search_file(matcher: &QueryMatcher, relative: &str, absolute: &Path) -> Option<SearchResult> {
    let content = match fs::read_to_string(absolute) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("[search] Failed to read {:?}: {}", absolute, e);
            return None;
        }
    };

    if !matcher.is_match(&content) {
        return None;
    }

    Some(SearchResult {
        note_id: relative.to_string(),
        title: title_from_path(relative),
        content: content.chars().take(EXCERPT_CHARS).collect(),
        matches: matcher.count(&content),
    })
}

/// Linear substring search over every note in the workspace.
///
/// Results come back in tree order (folders first, then alphabetical); there
/// is no ranking. An empty query returns nothing without touching the disk.
pub fn search_notes(root: &Path, query: &str) -> Vec<SearchResult> {
    if query.is_empty() {
        return Vec::new();
    }

    let mut notes: Vec<(String, PathBuf)> = Vec::new();
    walk_workspace(root, |entry| {
        if entry.kind == EntryKind::Note {
            notes.push((entry.relative_path, entry.absolute_path.to_path_buf()));
        }
    });

    let matcher = QueryMatcher::new(query);
    let results: Vec<SearchResult> = notes
        .par_iter()
        .filter_map(|(relative, absolute)| search_file(&matcher, relative, absolute))
        .collect();

    log::debug!(
        "[search] '{}' matched {} of {} notes",
        query,
        results.len(),
        notes.len()
    );
    results
}
