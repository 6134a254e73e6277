//! Immutable folder path from the root to the current folder.

use crate::model::FolderRef;
use std::sync::Arc;

/// Ordered, non-empty path of folders; index 0 is the root.
///
/// Transitions return a new value and leave `self` untouched, so a clone
/// handed to a caller is a stable snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    folders: Arc<[FolderRef]>,
}

impl Breadcrumb {
    /// A breadcrumb holding only `root`.
    pub fn new(root: FolderRef) -> Self {
        Self {
            folders: Arc::from(vec![root]),
        }
    }

    /// A copy with `folder` appended.
    pub fn pushed(&self, folder: FolderRef) -> Self {
        let mut folders = self.folders.to_vec();
        folders.push(folder);
        Self {
            folders: folders.into(),
        }
    }

    /// A copy without the last folder, or `None` at the root.
    pub fn popped(&self) -> Option<Self> {
        if self.folders.len() <= 1 {
            return None;
        }
        Some(Self {
            folders: self.folders[..self.folders.len() - 1].to_vec().into(),
        })
    }

    /// The root folder.
    pub fn root(&self) -> &FolderRef {
        &self.folders[0]
    }

    /// The folder being viewed.
    pub fn current(&self) -> &FolderRef {
        &self.folders[self.folders.len() - 1]
    }

    /// Number of folders, root included. Never zero.
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Folders below the root.
    pub fn depth(&self) -> usize {
        self.folders.len() - 1
    }

    /// Returns true when viewing the root.
    pub fn is_root(&self) -> bool {
        self.folders.len() == 1
    }

    /// All folders from the root down.
    pub fn folders(&self) -> &[FolderRef] {
        &self.folders
    }

    /// Folder ids from the root down.
    pub fn ids(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.id.as_str()).collect()
    }

    /// Folder names from the root down.
    pub fn names(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.name.as_str()).collect()
    }

    /// `/Root/A/B`
    pub fn path(&self) -> String {
        self.folders
            .iter()
            .map(|f| format!("/{}", f.name))
            .collect()
    }

    /// `/Root/A/B/<file_name>`
    pub fn path_to(&self, file_name: &str) -> String {
        format!("{}/{}", self.path(), file_name)
    }
}
