use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the workspace core.
///
/// None of these cross the command surface: the coordinator logs them and
/// reports a plain success/failure/not-found result instead.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Note not found: '{0}'")]
    NotFound(PathBuf),

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Path '{0}' points outside the workspace")]
    OutsideWorkspace(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Rich presence error: {0}")]
    Presence(String),
}

impl WorkspaceError {
    /// Wrap an I/O error, folding `NotFound` into its own variant.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            WorkspaceError::NotFound(path)
        } else {
            WorkspaceError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkspaceError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
