//! Projection of navigator state into rows and a header.
//!
//! Nothing here talks to the remote store; a host renders [`Row`] values and
//! the [`Header`] however it likes.

use crate::format::{display_date, format_size};
use crate::model::{Action, ItemKind, Permissions, RemoteEntry};
use crate::navigation::{Breadcrumb, ListingState};
use crate::types::FOLDER_MIME_TYPE;

/// Icon shown next to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Icon {
    Folder,
    Gif,
    Jpg,
    Png,
    Svg,
    Image,
    Pdf,
    Mp3,
    Avi,
    Mkv,
    Ppt,
    Xls,
    Zip,
    Psd,
    Txt,
    Ai,
    Doc,
    Json,
    Csv,
    Rar,
    Other,
}

const ICONS: &[(&str, Icon)] = &[
    (FOLDER_MIME_TYPE, Icon::Folder),
    ("image/gif", Icon::Gif),
    ("image/jpeg", Icon::Jpg),
    ("image/png", Icon::Png),
    ("image/svg+xml", Icon::Svg),
    ("image/vnd.adobe.photoshop", Icon::Psd),
    ("application/pdf", Icon::Pdf),
    ("audio/mpeg", Icon::Mp3),
    ("video/x-msvideo", Icon::Avi),
    ("video/x-matroska", Icon::Mkv),
    ("application/vnd.ms-powerpoint", Icon::Ppt),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Icon::Ppt,
    ),
    ("application/vnd.ms-excel", Icon::Xls),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Icon::Xls,
    ),
    ("application/zip", Icon::Zip),
    ("application/x-zip-compressed", Icon::Zip),
    ("text/plain", Icon::Txt),
    ("application/illustrator", Icon::Ai),
    ("application/msword", Icon::Doc),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Icon::Doc,
    ),
    ("application/json", Icon::Json),
    ("text/csv", Icon::Csv),
    ("application/x-rar-compressed", Icon::Rar),
];

/// Picks the icon for a MIME type. Unknown types get [`Icon::Other`].
pub fn icon_for(type_tag: &str) -> Icon {
    if let Some((_, icon)) = ICONS.iter().find(|(tag, _)| *tag == type_tag) {
        return *icon;
    }
    if type_tag.starts_with("image/") {
        Icon::Image
    } else {
        Icon::Other
    }
}

/// Which per-row actions to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowPolicy {
    /// Configured permission level.
    pub permissions: Permissions,
    /// Whether copying a file's path is offered.
    pub copyable_paths: bool,
}

/// Affordances available on a row.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowActions {
    /// Folders open into a listing. A file opens its download locator
    /// ([`RemoteEntry::download_locator`]), which the host hands to a browser.
    pub open: bool,
    pub download: bool,
    pub share: bool,
    pub delete: bool,
    pub copy_path: bool,
}

impl RowActions {
    fn for_kind(kind: ItemKind, policy: &RowPolicy) -> Self {
        match kind {
            ItemKind::Folder => RowActions {
                open: true,
                ..Default::default()
            },
            ItemKind::File => RowActions {
                open: true,
                download: policy.permissions.allows(Action::Download),
                share: policy.permissions.allows(Action::Share),
                delete: policy.permissions.allows(Action::Delete),
                copy_path: policy.copyable_paths,
            },
        }
    }

    /// Returns true if any menu action (beyond open) is offered.
    pub fn has_menu(&self) -> bool {
        self.download || self.share || self.delete || self.copy_path
    }
}

/// A rendered entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    /// Blank for folders and empty files.
    pub size: String,
    /// Blank when the timestamp is missing or malformed.
    pub date: String,
    pub icon: Icon,
    pub actions: RowActions,
}

impl EntryRow {
    /// Renders one entry.
    pub fn from_entry(entry: &RemoteEntry, policy: &RowPolicy) -> Self {
        let kind = entry.kind();
        Self {
            id: entry.id().to_string(),
            name: entry.name().to_string(),
            kind,
            size: match kind {
                ItemKind::Folder => String::new(),
                ItemKind::File => format_size(entry.size()),
            },
            date: entry.modified().map(display_date).unwrap_or_default(),
            icon: icon_for(entry.type_tag()),
            actions: RowActions::for_kind(kind, policy),
        }
    }
}

/// One line of the listing view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Spinner while fetching.
    Loading,
    /// Placeholder for a folder with no entries.
    Empty,
    /// The fetch failed.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
    /// An entry.
    Entry(EntryRow),
}

/// Renders a listing. Entries keep the order they are published in.
pub fn render(state: &ListingState, policy: &RowPolicy) -> Vec<Row> {
    match state {
        ListingState::Loading => vec![Row::Loading],
        ListingState::Empty => vec![Row::Empty],
        ListingState::Ready(entries) if entries.is_empty() => vec![Row::Empty],
        ListingState::Ready(entries) => entries
            .iter()
            .map(|entry| Row::Entry(EntryRow::from_entry(entry, policy)))
            .collect(),
        ListingState::Error { reason, .. } => vec![Row::Failed {
            reason: reason.clone(),
        }],
    }
}

/// Title bar for the current folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Current folder name.
    pub title: String,
    /// Full breadcrumb path, when enabled.
    pub subtitle: Option<String>,
    /// Whether going back moves up a folder rather than leaving the browser.
    pub show_back: bool,
}

/// Builds the header for a breadcrumb.
pub fn header(breadcrumb: &Breadcrumb, show_path: bool) -> Header {
    Header {
        title: breadcrumb.current().name.clone(),
        subtitle: show_path.then(|| breadcrumb.path()),
        show_back: !breadcrumb.is_root(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::model::{FileEntry, FolderEntry, FolderRef};

    fn file(name: &str, mime_type: &str, size: u64) -> RemoteEntry {
        RemoteEntry::File(FileEntry {
            id: format!("id-{}", name),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            modified: Some("2023-05-01T10:00:00.000Z".to_string()),
            download_locator: None,
            share_locator: None,
        })
    }

    fn folder(name: &str) -> RemoteEntry {
        RemoteEntry::Folder(FolderEntry {
            id: format!("id-{}", name),
            name: name.to_string(),
            modified: Some("garbage".to_string()),
        })
    }

    #[test]
    fn test_icon_table() {
        assert_eq!(icon_for(FOLDER_MIME_TYPE), Icon::Folder);
        assert_eq!(icon_for("image/gif"), Icon::Gif);
        assert_eq!(icon_for("image/jpeg"), Icon::Jpg);
        assert_eq!(icon_for("image/webp"), Icon::Image);
        assert_eq!(icon_for("image/vnd.adobe.photoshop"), Icon::Psd);
        assert_eq!(icon_for("application/x-zip-compressed"), Icon::Zip);
        assert_eq!(icon_for("application/zip"), Icon::Zip);
        assert_eq!(
            icon_for("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            Icon::Xls
        );
        assert_eq!(icon_for("application/x-unknown"), Icon::Other);
        assert_eq!(icon_for(""), Icon::Other);
    }

    #[test]
    fn test_row_count_matches_state() {
        let policy = RowPolicy::default();
        assert_eq!(render(&ListingState::Loading, &policy), vec![Row::Loading]);
        assert_eq!(render(&ListingState::Empty, &policy), vec![Row::Empty]);
        assert_eq!(render(&ListingState::Ready(vec![]), &policy), vec![Row::Empty]);

        let failed = ListingState::Error {
            kind: ErrorKind::Transport,
            reason: "offline".to_string(),
        };
        assert_eq!(
            render(&failed, &policy),
            vec![Row::Failed {
                reason: "offline".to_string()
            }]
        );

        let entries = vec![folder("A"), file("b.txt", "text/plain", 1_500), file("c.pdf", "application/pdf", 0)];
        let rows = render(&ListingState::Ready(entries.clone()), &policy);
        assert_eq!(rows.len(), entries.len());
    }

    #[test]
    fn test_entry_row_fields() {
        let policy = RowPolicy::default();
        let row = EntryRow::from_entry(&file("b.txt", "text/plain", 1_500), &policy);
        assert_eq!(row.size, "1 KB");
        assert_eq!(row.date, "May 01, 2023");
        assert_eq!(row.icon, Icon::Txt);

        let row = EntryRow::from_entry(&folder("Docs"), &policy);
        assert_eq!(row.size, "");
        assert_eq!(row.date, "");
        assert_eq!(row.icon, Icon::Folder);
    }

    #[test]
    fn test_row_actions() {
        let strict = RowPolicy {
            permissions: Permissions::Strict,
            copyable_paths: false,
        };
        let admin = RowPolicy {
            permissions: Permissions::Admin,
            copyable_paths: true,
        };

        let actions = EntryRow::from_entry(&folder("Docs"), &admin).actions;
        assert!(actions.open);
        assert!(!actions.has_menu());

        let actions = EntryRow::from_entry(&file("a", "text/plain", 1), &strict).actions;
        assert!(actions.share);
        assert!(!actions.download);
        assert!(!actions.delete);

        let actions = EntryRow::from_entry(&file("a", "text/plain", 1), &admin).actions;
        assert!(actions.download && actions.delete && actions.copy_path);
    }

    #[test]
    fn test_header() {
        let root = Breadcrumb::new(FolderRef::new("root", "Drive Folder"));
        let header_at_root = header(&root, true);
        assert_eq!(header_at_root.title, "Drive Folder");
        assert_eq!(header_at_root.subtitle.as_deref(), Some("/Drive Folder"));
        assert!(!header_at_root.show_back);

        let nested = root.pushed(FolderRef::new("p", "Photos"));
        let nested_header = header(&nested, false);
        assert_eq!(nested_header.title, "Photos");
        assert_eq!(nested_header.subtitle, None);
        assert!(nested_header.show_back);
    }
}
