//! Values the navigator publishes: listing state, navigation state and events.

use crate::errors::ErrorKind;
use crate::model::{FolderRef, RemoteEntry};
use std::path::PathBuf;

/// What the listing view should show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListingState {
    /// A fetch is in flight.
    #[default]
    Loading,
    /// The folder has no entries.
    Empty,
    /// Entries in display order.
    Ready(Vec<RemoteEntry>),
    /// The fetch failed.
    Error {
        /// Failure class.
        kind: ErrorKind,
        /// Human-readable reason.
        reason: String,
    },
}

impl ListingState {
    /// Entries, if the listing is ready.
    pub fn entries(&self) -> &[RemoteEntry] {
        match self {
            ListingState::Ready(entries) => entries,
            _ => &[],
        }
    }

    /// Returns true while loading.
    pub fn is_loading(&self) -> bool {
        matches!(self, ListingState::Loading)
    }
}

/// Where the navigator is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationState {
    /// `initialize` has not been called.
    Uninitialized,
    /// Viewing the root.
    AtRoot,
    /// Viewing a folder below the root.
    AtFolder {
        /// Folders below the root.
        depth: usize,
    },
    /// A filtered listing of the current folder is in flight.
    Searching {
        /// The name filter.
        query: String,
    },
    /// A listing fetch is in flight.
    Busy {
        /// Folder being fetched.
        target: FolderRef,
    },
}

/// A remote operation that runs outside the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Delete an entry.
    Delete,
    /// Create a folder.
    CreateFolder,
    /// Upload a file.
    Upload,
    /// Download a file.
    Download,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Delete => "delete",
            Operation::CreateFolder => "create folder",
            Operation::Upload => "upload",
            Operation::Download => "download",
        })
    }
}

/// Notifications for the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// Back was requested at the root; the host may close the browser.
    RootReached,
    /// A folder was created.
    FolderCreated {
        /// Folder it was created in.
        parent_id: String,
        /// The new folder.
        folder: RemoteEntry,
    },
    /// An entry was deleted.
    Deleted {
        /// ID of the deleted entry.
        entry_id: String,
    },
    /// A file was uploaded.
    Uploaded {
        /// Folder it was uploaded into.
        parent_id: String,
        /// The new file.
        entry: RemoteEntry,
    },
    /// A download began.
    DownloadStarted {
        /// Remote file name.
        file_name: String,
        /// Local path being written.
        destination: PathBuf,
    },
    /// A download finished.
    DownloadCompleted {
        /// Remote file name.
        file_name: String,
        /// Local path written.
        destination: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A remote operation failed.
    OperationFailed {
        /// Which operation.
        operation: Operation,
        /// Human-readable reason.
        reason: String,
    },
}

/// Identifies one listing fetch.
///
/// A result is applied only while its ticket is the pending one and its
/// folder is still the breadcrumb top.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    /// Monotonic fetch counter.
    pub generation: u64,
    /// Folder being listed.
    pub folder_id: String,
    /// Name filter, for searches.
    pub query: Option<String>,
}

/// Result of [`Navigator::go_back`](super::Navigator::go_back).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    /// Moved up one level; the parent is being fetched.
    Fetching(FetchTicket),
    /// Already at the root; nothing changed.
    RootReached,
}

/// What a completion did when it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// A listing was published.
    ListingApplied(FetchTicket),
    /// A listing failed and `Error` was published.
    ListingFailed(FetchTicket),
    /// A superseded listing was dropped.
    ListingDiscarded(FetchTicket),
    /// A remote operation finished.
    Operation {
        /// Which operation.
        operation: Operation,
        /// Whether it succeeded.
        succeeded: bool,
    },
}
