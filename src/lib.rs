pub mod analyzer;
pub mod autosave;
pub mod error;
pub mod note;
pub mod presence;
pub mod sanitize;
pub mod search;
pub mod settings;
pub mod traverse;
pub mod tree;
pub mod workspace;

#[cfg(feature = "desktop")]
mod commands;

pub use error::{Result, WorkspaceError};
pub use note::{Note, NoteStore};
pub use presence::Activity;
pub use search::SearchResult;
pub use settings::{AppSettings, SettingsFile};
pub use tree::{FileTreeItem, ItemType};
pub use workspace::Workspace;

/// Settings from the platform config file, or the defaults if that fails.
#[cfg(feature = "desktop")]
async fn open_workspace() -> Workspace {
    let loaded = match SettingsFile::default_location() {
        Ok(file) => Workspace::load(file).await,
        Err(e) => Err(e),
    };
    match loaded {
        Ok(workspace) => workspace,
        Err(e) => {
            log::warn!("Could not load settings, using defaults: {}", e);
            Workspace::open(AppSettings::default()).await
        }
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            // Focus the main window when another instance tries to launch
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.set_focus();
                let _ = window.unminimize();
            }
        }))
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            let workspace = tauri::async_runtime::block_on(open_workspace());
            app.manage(workspace);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_workspace_path,
            commands::set_workspace_path,
            commands::read_file_tree,
            commands::read_note,
            commands::save_note,
            commands::create_note,
            commands::delete_note,
            commands::create_folder,
            commands::search_notes,
            commands::get_settings,
            commands::update_settings,
            commands::select_folder,
            commands::update_presence,
            commands::note_edited,
            commands::note_opened,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                let workspace = app.state::<Workspace>();
                tauri::async_runtime::block_on(workspace.shutdown());
            }
        });
}
