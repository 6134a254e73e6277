//! Domain model: entries, folder references and permissions.

use crate::types::{DriveFile, FOLDER_MIME_TYPE};
use serde::{Deserialize, Serialize};

/// Whether an entry is a folder or a file.
///
/// Folders order before files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A folder that can be opened.
    Folder,
    /// Anything else.
    File,
}

/// Classifies a remote object from its MIME type.
///
/// Only the Drive folder type is a folder; every other string, including the
/// empty one, is a file.
pub fn classify(type_tag: &str) -> ItemKind {
    if type_tag == FOLDER_MIME_TYPE {
        ItemKind::Folder
    } else {
        ItemKind::File
    }
}

/// A folder id and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderRef {
    /// Folder ID.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl FolderRef {
    /// Creates a folder reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A folder in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Folder ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Modification (or creation) timestamp.
    pub modified: Option<String>,
}

/// A file in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification (or creation) timestamp.
    pub modified: Option<String>,
    /// Direct content link.
    pub download_locator: Option<String>,
    /// Link for viewing in a browser.
    pub share_locator: Option<String>,
}

/// One item of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteEntry {
    /// A folder.
    Folder(FolderEntry),
    /// A file.
    File(FileEntry),
}

impl RemoteEntry {
    /// Builds an entry from a Drive file resource.
    pub fn from_drive_file(file: DriveFile) -> Self {
        let modified = file.modified_time.or(file.created_time);
        match classify(&file.mime_type) {
            ItemKind::Folder => RemoteEntry::Folder(FolderEntry {
                id: file.id,
                name: file.name,
                modified,
            }),
            ItemKind::File => RemoteEntry::File(FileEntry {
                id: file.id,
                name: file.name,
                size: file
                    .size
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                mime_type: file.mime_type,
                modified,
                download_locator: file.web_content_link,
                share_locator: file.web_view_link,
            }),
        }
    }

    /// Entry ID.
    pub fn id(&self) -> &str {
        match self {
            RemoteEntry::Folder(folder) => &folder.id,
            RemoteEntry::File(file) => &file.id,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            RemoteEntry::Folder(folder) => &folder.name,
            RemoteEntry::File(file) => &file.name,
        }
    }

    /// Folder or file.
    pub fn kind(&self) -> ItemKind {
        match self {
            RemoteEntry::Folder(_) => ItemKind::Folder,
            RemoteEntry::File(_) => ItemKind::File,
        }
    }

    /// MIME type; the Drive folder type for folders.
    pub fn type_tag(&self) -> &str {
        match self {
            RemoteEntry::Folder(_) => FOLDER_MIME_TYPE,
            RemoteEntry::File(file) => &file.mime_type,
        }
    }

    /// Size in bytes, 0 for folders.
    pub fn size(&self) -> u64 {
        match self {
            RemoteEntry::Folder(_) => 0,
            RemoteEntry::File(file) => file.size,
        }
    }

    /// Modification (or creation) timestamp.
    pub fn modified(&self) -> Option<&str> {
        match self {
            RemoteEntry::Folder(folder) => folder.modified.as_deref(),
            RemoteEntry::File(file) => file.modified.as_deref(),
        }
    }

    /// Direct content link; never set for folders.
    pub fn download_locator(&self) -> Option<&str> {
        match self {
            RemoteEntry::Folder(_) => None,
            RemoteEntry::File(file) => file.download_locator.as_deref(),
        }
    }

    /// Viewing link; never set for folders.
    pub fn share_locator(&self) -> Option<&str> {
        match self {
            RemoteEntry::Folder(_) => None,
            RemoteEntry::File(file) => file.share_locator.as_deref(),
        }
    }

    /// Returns true for folders.
    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteEntry::Folder(_))
    }

    /// The folder as a navigation target.
    pub fn as_folder_ref(&self) -> Option<FolderRef> {
        match self {
            RemoteEntry::Folder(folder) => Some(FolderRef::new(&folder.id, &folder.name)),
            RemoteEntry::File(_) => None,
        }
    }
}

impl From<DriveFile> for RemoteEntry {
    fn from(file: DriveFile) -> Self {
        RemoteEntry::from_drive_file(file)
    }
}

/// An action a user can take from the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Get a file's viewing link.
    Share,
    /// Save a file locally.
    Download,
    /// Delete an entry.
    Delete,
    /// Create a folder in the current folder.
    CreateFolder,
    /// Upload a local file into the current folder.
    Upload,
    /// Copy a file's breadcrumb path.
    CopyPath,
}

impl Action {
    /// Lowercase label used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Share => "share",
            Action::Download => "download",
            Action::Delete => "delete",
            Action::CreateFolder => "create folder",
            Action::Upload => "upload",
            Action::CopyPath => "copy path",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user may do beyond browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permissions {
    /// Browse and share.
    Strict,
    /// Browse, share and download.
    #[default]
    User,
    /// Everything, including delete, create folder and upload.
    Admin,
}

impl Permissions {
    /// Whether this level allows `action`. Copying paths is gated separately.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Share | Action::CopyPath => true,
            Action::Download => matches!(self, Permissions::User | Permissions::Admin),
            Action::Delete | Action::CreateFolder | Action::Upload => {
                matches!(self, Permissions::Admin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_file(mime: &str) -> DriveFile {
        DriveFile {
            id: "id".to_string(),
            name: "name".to_string(),
            mime_type: mime.to_string(),
            size: Some("2048".to_string()),
            created_time: Some("2023-01-01T00:00:00.000Z".to_string()),
            modified_time: None,
            web_content_link: Some("https://drive.example/dl".to_string()),
            web_view_link: Some("https://drive.example/view".to_string()),
            parents: None,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(FOLDER_MIME_TYPE), ItemKind::Folder);
        assert_eq!(classify(""), ItemKind::File);
        assert_eq!(classify("application/pdf"), ItemKind::File);
        assert_eq!(classify("application/vnd.google-apps.folder "), ItemKind::File);
        assert_eq!(classify("APPLICATION/VND.GOOGLE-APPS.FOLDER"), ItemKind::File);
        assert!(ItemKind::Folder < ItemKind::File);
    }

    #[test]
    fn test_folder_drops_locators() {
        let entry = RemoteEntry::from_drive_file(drive_file(FOLDER_MIME_TYPE));
        assert!(entry.is_folder());
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.download_locator(), None);
        assert_eq!(entry.share_locator(), None);
        assert_eq!(entry.type_tag(), FOLDER_MIME_TYPE);
        assert_eq!(entry.as_folder_ref(), Some(FolderRef::new("id", "name")));
    }

    #[test]
    fn test_file_keeps_locators() {
        let entry = RemoteEntry::from_drive_file(drive_file("image/png"));
        assert_eq!(entry.kind(), ItemKind::File);
        assert_eq!(entry.size(), 2048);
        assert_eq!(entry.download_locator(), Some("https://drive.example/dl"));
        assert_eq!(entry.share_locator(), Some("https://drive.example/view"));
        assert_eq!(entry.modified(), Some("2023-01-01T00:00:00.000Z"));
        assert_eq!(entry.as_folder_ref(), None);
    }

    #[test]
    fn test_bad_size_is_zero() {
        let mut file = drive_file("text/plain");
        file.size = Some("lots".to_string());
        assert_eq!(RemoteEntry::from(file).size(), 0);
    }

    #[test]
    fn test_permissions() {
        assert!(Permissions::Strict.allows(Action::Share));
        assert!(!Permissions::Strict.allows(Action::Download));
        assert!(Permissions::User.allows(Action::Download));
        assert!(!Permissions::User.allows(Action::Delete));
        assert!(Permissions::Admin.allows(Action::Delete));
        assert!(Permissions::Admin.allows(Action::CreateFolder));
        assert!(Permissions::Admin.allows(Action::Upload));
        assert_eq!(Permissions::default(), Permissions::User);
    }
}
