//! Tauri command handlers. Thin wrappers: every decision lives in
//! [`Workspace`]; these only unpack arguments and hand back plain data.

use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

use crate::note::Note;
use crate::presence::Activity;
use crate::search::SearchResult;
use crate::settings::AppSettings;
use crate::tree::FileTreeItem;
use crate::workspace::Workspace;

#[tauri::command]
pub async fn get_workspace_path(workspace: State<'_, Workspace>) -> Result<String, String> {
    Ok(workspace.workspace_path().await.to_string_lossy().to_string())
}

#[tauri::command]
pub async fn set_workspace_path(
    new_path: String,
    workspace: State<'_, Workspace>,
) -> Result<bool, String> {
    Ok(workspace.set_workspace_path(new_path).await)
}

#[tauri::command]
pub async fn read_file_tree(workspace: State<'_, Workspace>) -> Result<Vec<FileTreeItem>, String> {
    Ok(workspace.read_file_tree().await)
}

#[tauri::command]
pub async fn read_note(
    file_path: String,
    workspace: State<'_, Workspace>,
) -> Result<Option<Note>, String> {
    Ok(workspace.read_note(&file_path).await)
}

#[tauri::command]
pub async fn save_note(note: Note, workspace: State<'_, Workspace>) -> Result<bool, String> {
    Ok(workspace.save_note(&note).await)
}

#[tauri::command]
pub async fn create_note(
    folder_path: String,
    title: String,
    workspace: State<'_, Workspace>,
) -> Result<Option<String>, String> {
    Ok(workspace.create_note(&folder_path, &title).await)
}

#[tauri::command]
pub async fn delete_note(file_path: String, workspace: State<'_, Workspace>) -> Result<bool, String> {
    Ok(workspace.delete_note(&file_path).await)
}

#[tauri::command]
pub async fn create_folder(
    parent_path: String,
    folder_name: String,
    workspace: State<'_, Workspace>,
) -> Result<bool, String> {
    Ok(workspace.create_folder(&parent_path, &folder_name).await)
}

#[tauri::command]
pub async fn search_notes(
    query: String,
    workspace: State<'_, Workspace>,
) -> Result<Vec<SearchResult>, String> {
    Ok(workspace.search_notes(&query).await)
}

#[tauri::command]
pub async fn get_settings(workspace: State<'_, Workspace>) -> Result<AppSettings, String> {
    Ok(workspace.settings().await)
}

#[tauri::command]
pub async fn update_settings(
    settings: AppSettings,
    workspace: State<'_, Workspace>,
) -> Result<bool, String> {
    Ok(workspace.update_settings(settings).await)
}

#[tauri::command]
pub async fn note_edited(note: Note, workspace: State<'_, Workspace>) -> Result<(), String> {
    workspace.note_edited(note).await;
    Ok(())
}

#[tauri::command]
pub async fn note_opened(note: Note, workspace: State<'_, Workspace>) -> Result<(), String> {
    workspace.note_opened(&note).await;
    Ok(())
}

#[tauri::command]
pub async fn update_presence(
    presence: Activity,
    workspace: State<'_, Workspace>,
) -> Result<(), String> {
    workspace.update_presence(&presence).await;
    Ok(())
}

/// Native folder picker; `None` when the dialog is cancelled.
#[tauri::command]
pub async fn select_folder(app: AppHandle) -> Result<Option<String>, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog().file().pick_folder(move |folder| {
        let _ = tx.send(folder);
    });

    let picked = rx.await.map_err(|e| e.to_string())?;
    Ok(picked
        .and_then(|folder| folder.into_path().ok())
        .map(|path| path.to_string_lossy().to_string()))
}
