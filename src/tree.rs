use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::traverse::{walk_workspace, EntryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

/// One node of the sidebar tree. `path` is relative to the workspace root
/// and can be handed straight back to the note commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeItem {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeItem>>,
}

impl FileTreeItem {
    fn folder(name: String, path: String) -> Self {
        Self {
            id: path.clone(),
            name,
            path,
            item_type: ItemType::Folder,
            children: Some(Vec::new()),
        }
    }

    fn file(name: String, path: String) -> Self {
        Self {
            id: path.clone(),
            name,
            path,
            item_type: ItemType::File,
            children: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.item_type == ItemType::Folder
    }
}

/// Attach `item` to the innermost open folder, or to the top level.
fn attach(stack: &mut [(usize, FileTreeItem)], roots: &mut Vec<FileTreeItem>, item: FileTreeItem) {
    match stack.last_mut() {
        Some((_, parent)) => parent.children.get_or_insert_with(Vec::new).push(item),
        None => roots.push(item),
    }
}

/// Build the ordered tree for the workspace at `root`.
///
/// Never fails: unreadable directories show up empty and a missing root
/// yields an empty tree.
pub fn build_file_tree(root: &Path) -> Vec<FileTreeItem> {
    let mut roots: Vec<FileTreeItem> = Vec::new();
    // Folders still receiving children, paired with their depth
    let mut stack: Vec<(usize, FileTreeItem)> = Vec::new();

    walk_workspace(root, |entry| {
        while stack.last().is_some_and(|(depth, _)| *depth >= entry.depth) {
            if let Some((_, done)) = stack.pop() {
                attach(&mut stack, &mut roots, done);
            }
        }

        match entry.kind {
            EntryKind::Folder => {
                stack.push((entry.depth, FileTreeItem::folder(entry.name, entry.relative_path)));
            }
            EntryKind::Note => {
                attach(&mut stack, &mut roots, FileTreeItem::file(entry.name, entry.relative_path));
            }
        }
    });

    while let Some((_, done)) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }

    log::debug!("[tree] Built {} top-level items for {:?}", roots.len(), root);
    roots
}
