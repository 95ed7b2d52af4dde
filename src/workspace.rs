//! Experiment workspace layout.
//!
//! The worker writes into a fixed set of sub-folders below a root directory.
//! This module creates them and lists them for the file browser.

use crate::config::{
    FILE_TREE_FOLDERS, MATRICES_DIR, OUTPUTS_DIR, PLOTS_DIR, USER_INPUTS_DIR,
};
use crate::error::Result;
use crate::file_utils::PathExt;
use std::fs;
use std::path::{Path, PathBuf};

/// A workspace root and its conventional sub-folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.root.join(PLOTS_DIR)
    }

    pub fn matrices_dir(&self) -> PathBuf {
        self.root.join(MATRICES_DIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    pub fn user_inputs_dir(&self) -> PathBuf {
        self.root.join(USER_INPUTS_DIR)
    }

    /// Creates the root and every expected sub-folder. Safe to call repeatedly.
    pub fn ensure_structure(&self) -> Result<()> {
        for dir in [
            self.plots_dir(),
            self.matrices_dir(),
            self.outputs_dir(),
            self.user_inputs_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Flattened file browser listing.
    ///
    /// The root comes first, followed by each existing preferred folder and its
    /// immediate children (sorted, capped at `max_items` with a trailing marker).
    pub fn file_tree(&self, max_items: usize) -> Vec<TreeEntry> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        let mut entries = vec![TreeEntry {
            depth: 0,
            name: self.root.display_name(),
            path: Some(self.root.clone()),
            is_dir: true,
        }];

        for name in FILE_TREE_FOLDERS {
            let folder = self.root.join(name);
            if !folder.is_dir() {
                continue;
            }
            entries.push(TreeEntry {
                depth: 1,
                name: name.to_string(),
                path: Some(folder.clone()),
                is_dir: true,
            });
            entries.extend(folder_children(&folder, max_items));
        }

        entries
    }
}

/// One row of the file browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub depth: usize,
    pub name: String,
    /// `None` for the "more" marker row.
    pub path: Option<PathBuf>,
    pub is_dir: bool,
}

const MORE_MARKER: &str = "… (more)";

fn folder_children(folder: &Path, max_items: usize) -> Vec<TreeEntry> {
    let Ok(read_dir) = fs::read_dir(folder) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    let truncated = paths.len() > max_items;
    let mut children: Vec<TreeEntry> = paths
        .into_iter()
        .take(max_items)
        .map(|path| TreeEntry {
            depth: 2,
            name: path.display_name(),
            is_dir: path.is_dir(),
            path: Some(path),
        })
        .collect();

    if truncated {
        children.push(TreeEntry {
            depth: 2,
            name: MORE_MARKER.to_string(),
            path: None,
            is_dir: false,
        });
    }

    children
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_structure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("ws"));

        workspace.ensure_structure().unwrap();
        fs::write(workspace.plots_dir().join("a.png"), b"x").unwrap();
        workspace.ensure_structure().unwrap();

        assert!(workspace.plots_dir().is_dir());
        assert!(workspace.matrices_dir().is_dir());
        assert!(workspace.outputs_dir().is_dir());
        assert!(workspace.user_inputs_dir().is_dir());
        assert!(workspace.plots_dir().join("a.png").exists());
    }

    #[test]
    fn file_tree_lists_preferred_folders_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        workspace.ensure_structure().unwrap();
        fs::write(workspace.plots_dir().join("b.png"), b"x").unwrap();
        fs::write(workspace.plots_dir().join("a.png"), b"x").unwrap();

        let tree = workspace.file_tree(300);
        let rows: Vec<(usize, &str)> = tree.iter().map(|e| (e.depth, e.name.as_str())).collect();

        assert_eq!(tree[0].depth, 0);
        assert_eq!(
            rows[1..].to_vec(),
            vec![
                (1, "user_inputs"),
                (1, "outputs"),
                (1, "plots"),
                (2, "a.png"),
                (2, "b.png"),
                (1, "correlation_matrix"),
            ]
        );
    }

    #[test]
    fn file_tree_truncates_large_folders() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        fs::create_dir_all(workspace.outputs_dir()).unwrap();
        for i in 0..5 {
            fs::write(workspace.outputs_dir().join(format!("{i}.csv")), b"x").unwrap();
        }

        let tree = workspace.file_tree(3);
        let children: Vec<&TreeEntry> = tree.iter().filter(|e| e.depth == 2).collect();

        assert_eq!(children.len(), 4);
        assert_eq!(children[3].name, MORE_MARKER);
        assert!(children[3].path.is_none());
    }

    #[test]
    fn file_tree_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Workspace::new(dir.path().join("missing")).file_tree(300).is_empty());
    }
}
