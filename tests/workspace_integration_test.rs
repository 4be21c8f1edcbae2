//! End-to-end checks of the workspace commands against a real directory
//!
//! Presence stays off in every test so nothing tries to reach a Discord client.

use std::fs;

use disdian_lib::{AppSettings, ItemType, SettingsFile, Workspace};
use tempfile::TempDir;

fn offline_settings(dir: &TempDir) -> AppSettings {
    AppSettings {
        rich_presence: false,
        ..AppSettings::with_workspace(dir.path().join("notes"))
    }
}

#[tokio::test]
async fn test_note_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::open(offline_settings(&temp_dir)).await;

    // Opening creates the workspace directory
    assert!(temp_dir.path().join("notes").is_dir());

    assert!(workspace.create_folder("", "Projects").await);
    let path = workspace
        .create_note("Projects", "Launch Plan")
        .await
        .expect("note should be created");
    assert_eq!(path, "Projects/Launch-Plan.md");

    let mut note = workspace.read_note(&path).await.unwrap();
    assert_eq!(note.title(), "Launch-Plan");
    assert_eq!(note.content(), "# Launch Plan\n\n");

    note.set_content("# Launch Plan\n\nShip it #release #q3");
    assert!(workspace.save_note(&note).await);

    let reread = workspace.read_note(&path).await.unwrap();
    assert_eq!(reread.content(), "# Launch Plan\n\nShip it #release #q3");
    assert_eq!(reread.tags(), ["release", "q3"]);
    assert_eq!(reread.word_count(), 7);

    assert!(workspace.delete_note(&path).await);
    assert!(workspace.read_note(&path).await.is_none());
    // Second delete fails quietly
    assert!(!workspace.delete_note(&path).await);
}

#[tokio::test]
async fn test_create_twice_keeps_both_notes() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::open(offline_settings(&temp_dir)).await;

    let first = workspace.create_note("", "Daily").await.unwrap();
    let second = workspace.create_note("", "Daily").await.unwrap();

    assert_eq!(first, "Daily.md");
    assert_eq!(second, "Daily_1.md");
}

#[tokio::test]
async fn test_tree_and_search_see_the_same_notes() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("notes");
    fs::create_dir_all(root.join("zeta")).unwrap();
    fs::create_dir_all(root.join(".obsidian")).unwrap();
    fs::write(root.join("Alpha.md"), "hello world").unwrap();
    fs::write(root.join("zeta/Deep.md"), "Hello again, hello").unwrap();
    fs::write(root.join(".obsidian/hidden.md"), "hello from the dark").unwrap();
    fs::write(root.join("readme.txt"), "hello but not a note").unwrap();

    let workspace = Workspace::open(offline_settings(&temp_dir)).await;

    let tree = workspace.read_file_tree().await;
    let names: Vec<&str> = tree.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["zeta", "Alpha.md"]);
    assert_eq!(tree[0].item_type, ItemType::Folder);
    let children = tree[0].children.as_ref().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].path, "zeta/Deep.md");

    let results = workspace.search_notes("HELLO").await;
    let hits: Vec<(&str, usize)> = results
        .iter()
        .map(|r| (r.note_id.as_str(), r.matches))
        .collect();
    assert_eq!(hits, [("zeta/Deep.md", 2), ("Alpha.md", 1)]);

    assert!(workspace.search_notes("").await.is_empty());
    assert!(workspace.search_notes("absent").await.is_empty());
}

#[tokio::test]
async fn test_paths_outside_workspace_are_refused() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("secret.md"), "top secret").unwrap();
    let workspace = Workspace::open(offline_settings(&temp_dir)).await;

    assert!(workspace.read_note("../secret.md").await.is_none());
    assert!(!workspace.delete_note("../secret.md").await);
    assert!(workspace.create_note("..", "Escape").await.is_none());
    assert!(temp_dir.path().join("secret.md").exists());
}

#[tokio::test]
async fn test_settings_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("config").join("settings.json");

    {
        fs::create_dir_all(settings_path.parent().unwrap()).unwrap();
        let initial = serde_json::to_string(&offline_settings(&temp_dir)).unwrap();
        fs::write(&settings_path, initial).unwrap();

        let workspace = Workspace::load(SettingsFile::new(&settings_path)).await.unwrap();
        let mut settings = workspace.settings().await;
        settings.auto_save = false;
        settings.auto_save_interval = 5_000;
        assert!(workspace.update_settings(settings).await);

        let moved = temp_dir.path().join("elsewhere");
        assert!(workspace.set_workspace_path(&moved).await);
        workspace.shutdown().await;
    }

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&settings_path).unwrap()).unwrap();
    assert_eq!(raw["autoSave"], false);
    assert_eq!(raw["autoSaveInterval"], 5_000);
    assert_eq!(raw["discordRPC"], false);

    let reopened = Workspace::load(SettingsFile::new(&settings_path)).await.unwrap();
    let settings = reopened.settings().await;
    assert!(!settings.auto_save);
    assert_eq!(settings.workspace_path, temp_dir.path().join("elsewhere"));
    assert!(temp_dir.path().join("elsewhere").is_dir());
}

#[tokio::test]
async fn test_edits_are_flushed_after_the_interval() {
    let temp_dir = TempDir::new().unwrap();
    let settings = AppSettings {
        auto_save_interval: 50,
        ..offline_settings(&temp_dir)
    };
    let workspace = Workspace::open(settings).await;

    let path = workspace.create_note("", "Draft").await.unwrap();
    let mut note = workspace.read_note(&path).await.unwrap();

    note.set_content("first");
    workspace.note_edited(note.clone()).await;
    note.set_content("second");
    workspace.note_edited(note.clone()).await;
    assert!(workspace.autosave_pending());

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    assert!(!workspace.autosave_pending());
    let saved = fs::read_to_string(temp_dir.path().join("notes").join(&path)).unwrap();
    assert_eq!(saved, "second");
}
