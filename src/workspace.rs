//! The workspace coordinator: single owner of the settings (and therefore of
//! the workspace root), the autosave slot and the presence client.
//!
//! Every command returns plain data. Failures are logged here and reported as
//! `None`/`false`; no `WorkspaceError` reaches the presentation layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::autosave::AutoSaver;
use crate::error::Result;
use crate::note::{Note, NoteStore};
use crate::presence::{Activity, DiscordIpcConnector, PresenceClient, PresenceConnector};
use crate::search::{search_notes, SearchResult};
use crate::settings::{AppSettings, SettingsFile};
use crate::tree::{build_file_tree, FileTreeItem};

pub struct Workspace {
    settings: RwLock<AppSettings>,
    settings_file: Option<SettingsFile>,
    /// Taken under the settings write lock, held through the disk write, so
    /// snapshots reach the file in the order they were made
    persist_order: Mutex<()>,
    connector: Arc<dyn PresenceConnector>,
    presence: Mutex<Option<PresenceClient>>,
    autosave: AutoSaver,
}

async fn ensure_workspace_directory(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        log::info!("[workspace] Workspace directory exists: {:?}", path);
        return;
    }
    log::info!("[workspace] Creating workspace directory: {:?}", path);
    if let Err(e) = tokio::fs::create_dir_all(path).await {
        log::error!("[workspace] Failed to create workspace directory {:?}: {}", path, e);
    }
}

impl Workspace {
    /// Open with the given settings, talking to the local Discord client for
    /// rich presence and persisting nothing.
    pub async fn open(settings: AppSettings) -> Self {
        Self::open_with(settings, None, Arc::new(DiscordIpcConnector)).await
    }

    /// Open with settings loaded from (and later saved to) `settings_file`.
    pub async fn load(settings_file: SettingsFile) -> Result<Self> {
        let settings = settings_file.load()?;
        Ok(Self::open_with(settings, Some(settings_file), Arc::new(DiscordIpcConnector)).await)
    }

    pub async fn open_with(
        settings: AppSettings,
        settings_file: Option<SettingsFile>,
        connector: Arc<dyn PresenceConnector>,
    ) -> Self {
        ensure_workspace_directory(&settings.workspace_path).await;

        let presence = if settings.presence_active() {
            let client = PresenceClient::new(settings.presence_client_id.clone(), Arc::clone(&connector));
            client.connect().await;
            Some(client)
        } else {
            None
        };

        Self {
            settings: RwLock::new(settings),
            settings_file,
            persist_order: Mutex::new(()),
            connector,
            presence: Mutex::new(presence),
            autosave: AutoSaver::new(),
        }
    }

    async fn store(&self) -> NoteStore {
        NoteStore::new(self.settings.read().await.workspace_path.clone())
    }

    /// Write `settings` off the async threads. Called after the settings lock
    /// is released; `_ordered` keeps concurrent writes in sequence.
    async fn persist(&self, settings: AppSettings, _ordered: MutexGuard<'_, ()>) {
        let Some(file) = self.settings_file.clone() else {
            return;
        };
        match tokio::task::spawn_blocking(move || file.save(&settings)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("[workspace] Failed to persist settings: {}", e),
            Err(e) => log::error!("[workspace] Settings write task failed: {}", e),
        }
    }

    pub async fn workspace_path(&self) -> PathBuf {
        self.settings.read().await.workspace_path.clone()
    }

    /// Adopt `path` as the workspace root. Existing notes are not moved.
    pub async fn set_workspace_path(&self, path: impl Into<PathBuf>) -> bool {
        let (snapshot, ordered) = {
            let mut settings = self.settings.write().await;
            settings.workspace_path = path.into();
            log::info!("[workspace] Workspace path set to {:?}", settings.workspace_path);
            (settings.clone(), self.persist_order.lock().await)
        };
        self.persist(snapshot, ordered).await;
        true
    }

    pub async fn read_file_tree(&self) -> Vec<FileTreeItem> {
        let root = self.workspace_path().await;
        match tokio::task::spawn_blocking(move || build_file_tree(&root)).await {
            Ok(tree) => tree,
            Err(e) => {
                log::error!("[workspace] Tree build task failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn read_note(&self, path: &str) -> Option<Note> {
        match self.store().await.read(path).await {
            Ok(note) => Some(note),
            Err(e) => {
                log::error!("[workspace] Error reading note {}: {}", path, e);
                None
            }
        }
    }

    pub async fn save_note(&self, note: &Note) -> bool {
        match self.store().await.save(note).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("[workspace] Error saving note {}: {}", note.path(), e);
                false
            }
        }
    }

    pub async fn create_note(&self, parent: &str, title: &str) -> Option<String> {
        match self.store().await.create(parent, title).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("[workspace] Error creating note '{}' in '{}': {}", title, parent, e);
                None
            }
        }
    }

    pub async fn delete_note(&self, path: &str) -> bool {
        match self.store().await.delete(path).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("[workspace] Error deleting note {}: {}", path, e);
                false
            }
        }
    }

    pub async fn create_folder(&self, parent: &str, name: &str) -> bool {
        match self.store().await.create_folder(parent, name).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("[workspace] Error creating folder '{}' in '{}': {}", name, parent, e);
                false
            }
        }
    }

    pub async fn search_notes(&self, query: &str) -> Vec<SearchResult> {
        if query.is_empty() {
            return Vec::new();
        }
        let root = self.workspace_path().await;
        let query = query.to_string();
        match tokio::task::spawn_blocking(move || search_notes(&root, &query)).await {
            Ok(results) => results,
            Err(e) => {
                log::error!("[workspace] Search task failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn settings(&self) -> AppSettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings and apply their side effects before returning:
    /// presence is (re)connected or disconnected, autosave cancelled if off.
    pub async fn update_settings(&self, new_settings: AppSettings) -> bool {
        let ordered = {
            let mut settings = self.settings.write().await;
            *settings = new_settings.clone();
            self.persist_order.lock().await
        };
        self.persist(new_settings.clone(), ordered).await;

        if !new_settings.auto_save {
            self.autosave.cancel();
        }

        let mut presence = self.presence.lock().await;
        if new_settings.presence_active() {
            if let Some(client) = presence.as_ref() {
                if client.client_id() != new_settings.presence_client_id {
                    client.disconnect().await;
                    *presence = None;
                }
            }
            if presence.is_none() {
                let client = PresenceClient::new(
                    new_settings.presence_client_id.clone(),
                    Arc::clone(&self.connector),
                );
                client.connect().await;
                *presence = Some(client);
            }
        } else if !new_settings.rich_presence {
            if let Some(client) = presence.take() {
                client.disconnect().await;
            }
        }

        true
    }

    /// Called on every edit of the open note; arms the debounced autosave.
    pub async fn note_edited(&self, note: Note) {
        let (enabled, interval) = {
            let settings = self.settings.read().await;
            (settings.auto_save, settings.auto_save_interval)
        };
        if !enabled {
            return;
        }
        let store = self.store().await;
        self.autosave
            .schedule(store, note, Duration::from_millis(interval));
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    pub async fn update_presence(&self, activity: &Activity) {
        if !self.settings.read().await.rich_presence {
            return;
        }
        if let Some(client) = self.presence.lock().await.as_ref() {
            client.update(activity).await;
        }
    }

    /// Show "editing <title>" for the note that was just opened
    pub async fn note_opened(&self, note: &Note) {
        self.update_presence(&Activity::editing(note.title(), note.word_count()))
            .await;
    }

    pub async fn presence_connected(&self) -> bool {
        match self.presence.lock().await.as_ref() {
            Some(client) => client.is_connected().await,
            None => false,
        }
    }

    /// Cancel pending work and close the presence connection.
    pub async fn shutdown(&self) {
        self.autosave.cancel();
        if let Some(client) = self.presence.lock().await.take() {
            client.disconnect().await;
        }
        log::info!("[workspace] Shut down");
    }
}
