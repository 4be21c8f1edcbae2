//! Application settings and their JSON persistence.
//!
//! Settings live in `<config dir>/disdian/settings.json`, outside the
//! workspace, so switching workspaces never touches them. A missing or
//! partial file falls back to the defaults field by field.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};

const APP_DIR_NAME: &str = "Disdian";
const CONFIG_DIR_NAME: &str = "disdian";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Application id registered for the rich presence integration
pub const DEFAULT_PRESENCE_CLIENT_ID: &str = "1429861818960056501";
/// Autosave debounce, in milliseconds
pub const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    #[serde(rename = "workspacePath")]
    pub workspace_path: PathBuf,
    #[serde(rename = "autoSave")]
    pub auto_save: bool,
    /// Milliseconds between the last edit and the autosave flush
    #[serde(rename = "autoSaveInterval")]
    pub auto_save_interval: u64,
    #[serde(rename = "discordRPC")]
    pub rich_presence: bool,
    #[serde(rename = "discordClientId")]
    pub presence_client_id: String,
}

/// `<Documents>/Disdian`, falling back to the home or current directory
pub fn default_workspace_path() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            workspace_path: default_workspace_path(),
            auto_save: true,
            auto_save_interval: DEFAULT_AUTOSAVE_INTERVAL_MS,
            rich_presence: true,
            presence_client_id: DEFAULT_PRESENCE_CLIENT_ID.to_string(),
        }
    }
}

impl AppSettings {
    pub fn with_workspace(workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            ..Self::default()
        }
    }

    /// Presence is only attempted with a non-blank client id
    pub fn presence_active(&self) -> bool {
        self.rich_presence && !self.presence_client_id.trim().is_empty()
    }
}

/// Reads and writes `AppSettings` as pretty JSON at a fixed location.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The platform location, e.g. `~/.config/disdian/settings.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| WorkspaceError::Settings("Could not determine config directory".into()))?;
        Ok(Self::new(dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<AppSettings> {
        if !self.path.exists() {
            log::info!("[settings] No settings at {:?}, using defaults", self.path);
            return Ok(AppSettings::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| WorkspaceError::io(&self.path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(settings)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| WorkspaceError::io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| WorkspaceError::io(&self.path, e))?;
        log::debug!("[settings] Saved to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert!(settings.auto_save);
        assert_eq!(settings.auto_save_interval, 30_000);
        assert!(settings.rich_presence);
        assert_eq!(settings.presence_client_id, DEFAULT_PRESENCE_CLIENT_ID);
        assert!(settings.workspace_path.ends_with("Disdian"));
    }

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(AppSettings::with_workspace("/w")).unwrap();
        assert_eq!(value["workspacePath"], "/w");
        assert_eq!(value["autoSave"], true);
        assert_eq!(value["autoSaveInterval"], 30_000);
        assert_eq!(value["discordRPC"], true);
        assert!(value["discordClientId"].is_string());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "workspacePath": "/notes", "autoSave": false, "theme": "dark" }"#)
                .unwrap();
        assert_eq!(settings.workspace_path, PathBuf::from("/notes"));
        assert!(!settings.auto_save);
        assert_eq!(settings.auto_save_interval, DEFAULT_AUTOSAVE_INTERVAL_MS);
    }

    #[test]
    fn test_presence_active_requires_client_id() {
        let mut settings = AppSettings::with_workspace("/w");
        assert!(settings.presence_active());
        settings.presence_client_id = "  ".into();
        assert!(!settings.presence_active());
        settings.presence_client_id = "123".into();
        settings.rich_presence = false;
        assert!(!settings.presence_active());
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = SettingsFile::new(temp_dir.path().join("cfg/settings.json"));

        assert_eq!(file.load().unwrap().auto_save_interval, DEFAULT_AUTOSAVE_INTERVAL_MS);

        let mut settings = AppSettings::with_workspace(temp_dir.path().join("ws"));
        settings.auto_save_interval = 5_000;
        settings.rich_presence = false;
        file.save(&settings).unwrap();

        assert_eq!(file.load().unwrap(), settings);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(SettingsFile::new(path).load().is_err());
    }
}
