//! Shared workspace walk used by the tree builder and the search engine.
//!
//! Both consumers must agree on what counts as a note and what is skipped,
//! so the filtering and ordering rules live here only:
//! - entries whose name starts with `.` are skipped (and not descended into)
//! - directories are folders, whatever they contain
//! - files ending in `.md` are notes, every other file is skipped
//! - siblings are visited folders first, then alphabetical by the Unicode
//!   root collation (`ё` sorts with `е`, `Ä` with `A`)

use std::cmp::Ordering;
use std::path::{Component, Path};

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use once_cell::sync::Lazy;
use walkdir::{DirEntry, WalkDir};

/// File extension (without the dot) that marks a file as a note
pub const NOTE_EXTENSION: &str = "md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Note,
}

/// One visited entry, handed to the visitor in display order.
#[derive(Debug)]
pub struct WorkspaceEntry<'a> {
    /// 1 for direct children of the root
    pub depth: usize,
    pub name: String,
    /// `/`-separated path relative to the workspace root
    pub relative_path: String,
    pub absolute_path: &'a Path,
    pub kind: EntryKind,
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

pub fn is_note_file_name(name: &str) -> bool {
    name.len() > NOTE_EXTENSION.len() + 1
        && name.ends_with(&format!(".{}", NOTE_EXTENSION))
}

static COLLATOR: Lazy<Option<CollatorBorrowed<'static>>> = Lazy::new(|| {
    Collator::try_new(Default::default(), CollatorOptions::default())
        .map_err(|e| log::warn!("[traverse] Collation data unavailable, using lowercase order: {}", e))
        .ok()
});

/// Alphabetical order as a user expects it, independent of code points
pub fn collate(a: &str, b: &str) -> Ordering {
    match COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Display order among siblings: folders before files, then by name.
/// Names the collator considers equal fall back to code point order.
pub fn compare_names(a_is_dir: bool, a_name: &str, b_is_dir: bool, b_name: &str) -> Ordering {
    b_is_dir
        .cmp(&a_is_dir)
        .then_with(|| collate(a_name, b_name))
        .then_with(|| a_name.cmp(b_name))
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    compare_names(
        a.file_type().is_dir(),
        &a.file_name().to_string_lossy(),
        b.file_type().is_dir(),
        &b.file_name().to_string_lossy(),
    )
}

fn is_visible(entry: &DirEntry) -> bool {
    // The root itself may live in a hidden directory
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if is_hidden(&name) {
        return false;
    }
    entry.file_type().is_dir() || is_note_file_name(&name)
}

/// Render `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Walk the workspace rooted at `root`, calling `visit` for every folder and
/// note in display order (pre-order, parents before their children).
///
/// Directories that cannot be listed are logged and contribute nothing; the
/// walk carries on with their siblings.
pub fn walk_workspace<F>(root: &Path, mut visit: F)
where
    F: FnMut(WorkspaceEntry<'_>),
{
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by(compare_entries)
        .into_iter()
        .filter_entry(is_visible);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("[traverse] Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let relative_path = match relative_path(root, entry.path()) {
            Some(rel) => rel,
            None => continue,
        };
        let kind = if entry.file_type().is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::Note
        };

        visit(WorkspaceEntry {
            depth: entry.depth(),
            name: entry.file_name().to_string_lossy().to_string(),
            relative_path,
            absolute_path: entry.path(),
            kind,
        });
    }
}
