use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::analyzer::{extract_tags, word_count};
use crate::error::{Result, WorkspaceError};
use crate::sanitize::sanitize_file_name;
use crate::traverse::{relative_path, NOTE_EXTENSION};

/// A Markdown note plus the metadata derived from it.
///
/// `tags` and `word_count` are always recomputed from `content`; they are
/// never read from anywhere else, including from deserialized input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NoteInput")]
pub struct Note {
    id: String,
    title: String,
    content: String,
    path: String,
    tags: Vec<String>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    word_count: usize,
}

/// What the presentation layer may send back; derived fields are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteInput {
    path: String,
    #[serde(default)]
    content: String,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl From<NoteInput> for Note {
    fn from(input: NoteInput) -> Self {
        let now = Utc::now();
        Note::new(
            input.path,
            input.content,
            input.created.unwrap_or(now),
            input.modified.unwrap_or(now),
        )
    }
}

/// Title shown for a note: its file name without the note extension
pub fn title_from_path(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(&format!(".{}", NOTE_EXTENSION))
        .unwrap_or(name)
        .to_string()
}

impl Note {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        let path = path.into();
        let content = content.into();
        Self {
            id: path.clone(),
            title: title_from_path(&path),
            tags: extract_tags(&content),
            word_count: word_count(&content),
            content,
            path,
            created,
            modified,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Replace the in-memory content and refresh everything derived from it.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.tags = extract_tags(&self.content);
        self.word_count = word_count(&self.content);
        self.modified = Utc::now();
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling name unique to this write, so concurrent saves of one note
/// never share a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{}.{}-{}.disdian-tmp",
        file_name,
        std::process::id(),
        seq
    ))
}

/// Write through a hidden sibling temp file and rename it into place, so a
/// reader never observes a half-written note. Concurrent writers each rename
/// their own complete file; the last rename wins.
async fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(path);

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| WorkspaceError::io(&temp_path, e))?;
    let written = async {
        file.write_all(content).await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(WorkspaceError::io(&temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(WorkspaceError::io(path, e));
    }
    Ok(())
}

/// Candidate names for `target`: itself, then `_1`, `_2`, ... appended to the stem
fn collision_candidate(target: &Path, counter: u32) -> PathBuf {
    if counter == 0 {
        return target.to_path_buf();
    }
    let stem = target
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let new_name = match target.extension() {
        Some(ext) => format!("{}_{}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}_{}", stem, counter),
    };
    target.with_file_name(new_name)
}

/// Claim the first free name for `target` and write `content` into it.
///
/// The name is reserved with `create_new`, so two creators racing for the
/// same title always end up with different files.
async fn create_unique(target: &Path, content: &[u8]) -> Result<PathBuf> {
    let mut counter = 0;
    loop {
        let candidate = collision_candidate(target, counter);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(mut file) => {
                file.write_all(content)
                    .await
                    .map_err(|e| WorkspaceError::io(&candidate, e))?;
                file.sync_all()
                    .await
                    .map_err(|e| WorkspaceError::io(&candidate, e))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(WorkspaceError::io(&candidate, e)),
        }
    }
}

/// Note persistence keyed by workspace-relative path.
///
/// Holds nothing but the root: every call opens, acts and releases on its own.
/// There is no locking; concurrent writes to one path race and the last one wins.
#[derive(Debug, Clone)]
pub struct NoteStore {
    root: PathBuf,
}

impl NoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path. An empty path is the root itself.
    /// Absolute paths and `..` components are refused.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::OutsideWorkspace(relative.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    fn relative(&self, full: &Path) -> String {
        relative_path(&self.root, full).unwrap_or_else(|| full.to_string_lossy().to_string())
    }

    pub async fn read(&self, path: &str) -> Result<Note> {
        let full_path = self.resolve(path)?;
        let content = fs::read_to_string(&full_path)
            .await
            .map_err(|e| WorkspaceError::io(&full_path, e))?;
        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|e| WorkspaceError::io(&full_path, e))?;

        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        // Birth time is not available on every filesystem
        let created: DateTime<Utc> = metadata
            .created()
            .map(DateTime::from)
            .unwrap_or(modified);

        Ok(Note::new(self.relative(&full_path), content, created, modified))
    }

    pub async fn save(&self, note: &Note) -> Result<()> {
        let full_path = self.resolve(note.path())?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkspaceError::io(parent, e))?;
        }
        atomic_write_file(&full_path, note.content().as_bytes()).await?;
        log::debug!("[note_store] Saved {:?}", full_path);
        Ok(())
    }

    /// Create a note titled `title` under `parent` (the root when empty) and
    /// return its workspace-relative path.
    pub async fn create(&self, parent: &str, title: &str) -> Result<String> {
        let file_name = format!("{}.{}", sanitize_file_name(title), NOTE_EXTENSION);
        let target_dir = self.resolve(parent)?;

        fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| WorkspaceError::io(&target_dir, e))?;

        let template = format!("# {}\n\n", title);
        let full_path = create_unique(&target_dir.join(file_name), template.as_bytes()).await?;

        let relative = self.relative(&full_path);
        log::info!("[note_store] Created note {}", relative);
        Ok(relative)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path)
            .await
            .map_err(|e| WorkspaceError::io(&full_path, e))?;
        log::info!("[note_store] Deleted {:?}", full_path);
        Ok(())
    }

    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<()> {
        let relative = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent.trim_end_matches('/'), name)
        };
        let full_path = self.resolve(&relative)?;
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| WorkspaceError::io(&full_path, e))?;
        log::info!("[note_store] Created folder {:?}", full_path);
        Ok(())
    }
}
