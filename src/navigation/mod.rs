//! Folder navigation state machine.
//!
//! A [`Navigator`] owns the breadcrumb and the published listing. Each user
//! action replaces the breadcrumb and starts a gateway call on a tokio task;
//! completions come back over a channel and are applied by
//! [`Navigator::process_next`] or [`Navigator::process_pending`] on the owning
//! task. Listing results carry a [`FetchTicket`] and are dropped unless they
//! are still the pending fetch for the folder on top of the breadcrumb.
//!
//! All operations that start remote work spawn onto the current tokio runtime
//! and must be called from within one.

mod breadcrumb;
mod state;

pub use breadcrumb::Breadcrumb;
pub use state::{
    BackOutcome, BrowserEvent, FetchTicket, ListingState, NavigationState, Operation, Processed,
};

use crate::config::BrowserConfig;
use crate::errors::{
    AuthorizationError, BrowserError, BrowserResult, ConfigurationError, DownloadError,
    NavigationError, RequestError, ResourceError,
};
use crate::format::ordered_for_display;
use crate::gateway::{RemoteDirectoryGateway, UploadSource};
use crate::model::{Action, FolderRef, Permissions, RemoteEntry};
use crate::presentation::{self, Header, RowPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Navigator settings that do not concern the remote store.
#[derive(Debug, Clone)]
pub struct NavigatorOptions {
    /// Actions available to the user.
    pub permissions: Permissions,
    /// Whether [`Navigator::copy_path`] is available.
    pub copyable_paths: bool,
    /// Local directory downloads are written under.
    pub download_dir: PathBuf,
}

impl Default for NavigatorOptions {
    fn default() -> Self {
        Self {
            permissions: Permissions::default(),
            copyable_paths: false,
            download_dir: PathBuf::from("downloads"),
        }
    }
}

impl From<&BrowserConfig> for NavigatorOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            permissions: config.permissions,
            copyable_paths: config.copyable_paths,
            download_dir: config.download_dir.clone(),
        }
    }
}

struct PendingFetch {
    ticket: FetchTicket,
    /// Restored if this fetch fails.
    rollback: Option<Breadcrumb>,
}

enum Completion {
    Listing {
        ticket: FetchTicket,
        result: BrowserResult<Vec<RemoteEntry>>,
    },
    Deleted {
        entry_id: String,
        origin_folder_id: String,
        result: BrowserResult<()>,
    },
    FolderCreated {
        parent_id: String,
        result: BrowserResult<RemoteEntry>,
    },
    Uploaded {
        parent_id: String,
        result: BrowserResult<RemoteEntry>,
    },
    Downloaded {
        file_name: String,
        destination: PathBuf,
        result: BrowserResult<u64>,
    },
}

/// Browses a remote folder tree through a [`RemoteDirectoryGateway`].
pub struct Navigator<G: RemoteDirectoryGateway> {
    gateway: Arc<G>,
    options: NavigatorOptions,
    breadcrumb: Option<Breadcrumb>,
    initialized: bool,
    pending: Option<PendingFetch>,
    generation: u64,
    outstanding: usize,
    listing_tx: watch::Sender<ListingState>,
    events_tx: broadcast::Sender<BrowserEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<G: RemoteDirectoryGateway> Navigator<G> {
    /// Creates a navigator with no root.
    pub fn new(gateway: G, options: NavigatorOptions) -> Self {
        Self::with_shared_gateway(Arc::new(gateway), options)
    }

    /// Creates a navigator over a gateway shared with other owners.
    pub fn with_shared_gateway(gateway: Arc<G>, options: NavigatorOptions) -> Self {
        let (listing_tx, _) = watch::channel(ListingState::Loading);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            options,
            breadcrumb: None,
            initialized: false,
            pending: None,
            generation: 0,
            outstanding: 0,
            listing_tx,
            events_tx,
            completions_tx,
            completions_rx,
        }
    }

    /// Creates a navigator using the options and root folder from `config`.
    pub fn from_config(gateway: G, config: &BrowserConfig) -> Self {
        let mut navigator = Self::new(gateway, NavigatorOptions::from(config));
        navigator.breadcrumb = config.root_folder.clone().map(Breadcrumb::new);
        navigator
    }

    /// Sets the root folder. Only allowed before [`initialize`](Self::initialize).
    pub fn set_root(&mut self, id: impl Into<String>, name: impl Into<String>) -> BrowserResult<()> {
        if self.initialized {
            return Err(NavigationError::RootLocked.into());
        }
        let root = FolderRef::new(id, name);
        if root.id.trim().is_empty() {
            return Err(ConfigurationError::MissingRootFolder.into());
        }
        self.breadcrumb = Some(Breadcrumb::new(root));
        Ok(())
    }

    /// Starts browsing at the root.
    ///
    /// Calling it again re-fetches the current folder.
    pub fn initialize(&mut self) -> BrowserResult<FetchTicket> {
        if self.breadcrumb.is_none() {
            return Err(ConfigurationError::MissingRootFolder.into());
        }
        if self.initialized {
            return self.refresh();
        }
        self.initialized = true;
        info!(root = ?self.breadcrumb.as_ref().map(|b| b.root()), "navigator initialized");
        Ok(self.start_fetch(None, None))
    }

    /// Opens a folder below the current one.
    ///
    /// If the listing fails the breadcrumb returns to where it was.
    pub fn enter_folder(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> BrowserResult<FetchTicket> {
        let folder = FolderRef::new(id, name);
        if folder.id.is_empty() {
            return Err(RequestError::MissingParameter("folder id is required".to_string()).into());
        }
        let current = self.listed_breadcrumb()?.clone();

        let rollback = self.inherited_rollback().or_else(|| Some(current.clone()));
        debug!(folder = %folder.id, "entering folder");
        self.breadcrumb = Some(current.pushed(folder));
        Ok(self.start_fetch(None, rollback))
    }

    /// Opens a listed folder entry.
    pub fn open(&mut self, entry: &RemoteEntry) -> BrowserResult<FetchTicket> {
        match entry.as_folder_ref() {
            Some(folder) => self.enter_folder(folder.id, folder.name),
            None => Err(RequestError::InvalidParameter(format!(
                "{} is not a folder",
                entry.name()
            ))
            .into()),
        }
    }

    /// Moves up one level, or reports that the root was reached.
    ///
    /// Going back while a fetch is pending keeps that fetch's rollback, so a
    /// failure lands on the last breadcrumb that was actually listed.
    pub fn go_back(&mut self) -> BrowserResult<BackOutcome> {
        let current = self.listed_breadcrumb()?;
        match current.popped() {
            Some(parent) => {
                debug!(folder = %parent.current().id, "going back");
                let rollback = self.inherited_rollback();
                self.breadcrumb = Some(parent);
                Ok(BackOutcome::Fetching(self.start_fetch(None, rollback)))
            }
            None => {
                debug!("back requested at root");
                self.emit(BrowserEvent::RootReached);
                Ok(BackOutcome::RootReached)
            }
        }
    }

    /// Lists the current folder filtered by name. Blank queries are ignored.
    pub fn search(&mut self, query: &str) -> BrowserResult<Option<FetchTicket>> {
        self.listed_breadcrumb()?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let rollback = self.inherited_rollback();
        Ok(Some(self.start_fetch(Some(query.to_string()), rollback)))
    }

    /// Leaves search, re-fetching the unfiltered current folder.
    pub fn close_search(&mut self) -> BrowserResult<FetchTicket> {
        self.refresh()
    }

    /// Re-fetches the current folder.
    pub fn refresh(&mut self) -> BrowserResult<FetchTicket> {
        self.listed_breadcrumb()?;
        let rollback = self.inherited_rollback();
        Ok(self.start_fetch(None, rollback))
    }

    /// Deletes an entry. On success the current folder is refreshed if it is
    /// still the one the delete was issued from.
    pub fn delete(&mut self, entry_id: &str) -> BrowserResult<()> {
        let origin_folder_id = self.listed_breadcrumb()?.current().id.clone();
        self.require(Action::Delete)?;
        if entry_id.is_empty() {
            return Err(RequestError::MissingParameter("entry id is required".to_string()).into());
        }

        let entry_id = entry_id.to_string();
        info!(entry = %entry_id, "deleting entry");
        let gateway = self.gateway.clone();
        self.spawn(async move {
            let result = gateway.delete(&entry_id).await;
            Completion::Deleted {
                entry_id,
                origin_folder_id,
                result,
            }
        });
        Ok(())
    }

    /// Creates a folder inside the current folder.
    pub fn create_folder(&mut self, name: &str) -> BrowserResult<()> {
        let parent_id = self.listed_breadcrumb()?.current().id.clone();
        self.require(Action::CreateFolder)?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(RequestError::MissingParameter("folder name is required".to_string()).into());
        }

        let gateway = self.gateway.clone();
        self.spawn(async move {
            let result = gateway.create_folder(&parent_id, &name).await;
            Completion::FolderCreated { parent_id, result }
        });
        Ok(())
    }

    /// Uploads a local file into the current folder.
    pub fn upload(&mut self, source: UploadSource) -> BrowserResult<()> {
        let parent_id = self.listed_breadcrumb()?.current().id.clone();
        self.require(Action::Upload)?;

        info!(name = %source.name, size = source.size, parent = %parent_id, "uploading file");
        let gateway = self.gateway.clone();
        self.spawn(async move {
            let result = gateway.upload(&parent_id, &source).await;
            Completion::Uploaded { parent_id, result }
        });
        Ok(())
    }

    /// Downloads a file under the download directory, mirroring the
    /// breadcrumb. Returns the destination path.
    pub fn download(&mut self, entry: &RemoteEntry) -> BrowserResult<PathBuf> {
        let breadcrumb = self.listed_breadcrumb()?.clone();
        self.require(Action::Download)?;
        let file = match entry {
            RemoteEntry::File(file) => file.clone(),
            RemoteEntry::Folder(folder) => {
                return Err(DownloadError::NotAFile(folder.name.clone()).into())
            }
        };

        let mut destination = self.options.download_dir.clone();
        for name in breadcrumb.names() {
            destination.push(path_component(name));
        }
        destination.push(path_component(&file.name));

        self.emit(BrowserEvent::DownloadStarted {
            file_name: file.name.clone(),
            destination: destination.clone(),
        });

        let gateway = self.gateway.clone();
        let target = destination.clone();
        self.spawn(async move {
            let result = gateway.download(&file, &target).await;
            Completion::Downloaded {
                file_name: file.name,
                destination: target,
                result,
            }
        });
        Ok(destination)
    }

    /// The viewing link of a file.
    pub fn share_link(&self, entry: &RemoteEntry) -> BrowserResult<String> {
        self.require(Action::Share)?;
        match entry {
            RemoteEntry::Folder(folder) => Err(RequestError::InvalidParameter(format!(
                "{} is a folder and has no share link",
                folder.name
            ))
            .into()),
            RemoteEntry::File(file) => file.share_locator.clone().ok_or_else(|| {
                ResourceError::FileNotFound(format!("no share link for {}", file.name)).into()
            }),
        }
    }

    /// The breadcrumb path of a file in the current folder.
    pub fn copy_path(&self, file_name: &str) -> BrowserResult<String> {
        let breadcrumb = self.listed_breadcrumb()?;
        self.require(Action::CopyPath)?;
        Ok(breadcrumb.path_to(file_name))
    }

    /// Whether the configured permissions allow `action`.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::CopyPath => self.options.copyable_paths,
            _ => self.options.permissions.allows(action),
        }
    }

    /// Per-row affordances matching the configured permissions.
    pub fn row_policy(&self) -> RowPolicy {
        RowPolicy {
            permissions: self.options.permissions,
            copyable_paths: self.options.copyable_paths,
        }
    }

    /// The folder being viewed.
    pub fn current_folder(&self) -> Option<&FolderRef> {
        self.breadcrumb.as_ref().map(Breadcrumb::current)
    }

    /// A snapshot of the breadcrumb.
    pub fn breadcrumb(&self) -> Option<Breadcrumb> {
        self.breadcrumb.clone()
    }

    /// Where the navigator is.
    pub fn state(&self) -> NavigationState {
        let breadcrumb = match (&self.breadcrumb, self.initialized) {
            (Some(breadcrumb), true) => breadcrumb,
            _ => return NavigationState::Uninitialized,
        };
        match &self.pending {
            Some(PendingFetch { ticket, .. }) => match &ticket.query {
                Some(query) => NavigationState::Searching {
                    query: query.clone(),
                },
                None => NavigationState::Busy {
                    target: breadcrumb.current().clone(),
                },
            },
            None if breadcrumb.is_root() => NavigationState::AtRoot,
            None => NavigationState::AtFolder {
                depth: breadcrumb.depth(),
            },
        }
    }

    /// The latest published listing.
    pub fn listing(&self) -> ListingState {
        self.listing_tx.borrow().clone()
    }

    /// Observes listing changes; only the latest value is kept.
    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.listing_tx.subscribe()
    }

    /// Receives events emitted from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events_tx.subscribe()
    }

    /// Header for the current folder.
    pub fn header(&self, show_path: bool) -> Option<Header> {
        self.breadcrumb
            .as_ref()
            .map(|breadcrumb| presentation::header(breadcrumb, show_path))
    }

    /// Number of spawned calls whose completions have not been applied.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Waits for and applies the next completion.
    ///
    /// Returns `None` immediately when nothing is outstanding.
    pub async fn process_next(&mut self) -> Option<Processed> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Applies every completion that has already arrived, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    fn listed_breadcrumb(&self) -> BrowserResult<&Breadcrumb> {
        match (&self.breadcrumb, self.initialized) {
            (Some(breadcrumb), true) => Ok(breadcrumb),
            (None, _) => Err(ConfigurationError::MissingRootFolder.into()),
            (Some(_), false) => Err(NavigationError::NotInitialized.into()),
        }
    }

    fn require(&self, action: Action) -> BrowserResult<()> {
        if self.allows(action) {
            Ok(())
        } else {
            warn!(action = %action, permissions = ?self.options.permissions, "action not permitted");
            Err(AuthorizationError::ActionNotPermitted(action.to_string()).into())
        }
    }

    fn inherited_rollback(&self) -> Option<Breadcrumb> {
        self.pending.as_ref().and_then(|p| p.rollback.clone())
    }

    fn emit(&self, event: BrowserEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.outstanding += 1;
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }

    fn start_fetch(&mut self, query: Option<String>, rollback: Option<Breadcrumb>) -> FetchTicket {
        let folder_id = self
            .breadcrumb
            .as_ref()
            .map(|b| b.current().id.clone())
            .unwrap_or_default();

        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            folder_id: folder_id.clone(),
            query: query.clone(),
        };

        if let Some(previous) = self.pending.replace(PendingFetch {
            ticket: ticket.clone(),
            rollback,
        }) {
            debug!(superseded = previous.ticket.generation, by = ticket.generation, "fetch superseded");
        }
        self.listing_tx.send_replace(ListingState::Loading);

        let gateway = self.gateway.clone();
        let sent = ticket.clone();
        self.spawn(async move {
            let result = match &sent.query {
                Some(query) => gateway.search(&folder_id, query).await,
                None => gateway.list(&folder_id).await,
            };
            Completion::Listing {
                ticket: sent,
                result,
            }
        });

        ticket
    }

    fn apply(&mut self, completion: Completion) -> Processed {
        self.outstanding = self.outstanding.saturating_sub(1);
        match completion {
            Completion::Listing { ticket, result } => self.apply_listing(ticket, result),
            Completion::Deleted {
                entry_id,
                origin_folder_id,
                result,
            } => {
                let succeeded = self.finish(Operation::Delete, result.map(|_| ()), || {
                    BrowserEvent::Deleted {
                        entry_id: entry_id.clone(),
                    }
                });
                if succeeded {
                    self.refresh_if_current(&origin_folder_id);
                }
                Processed::Operation {
                    operation: Operation::Delete,
                    succeeded,
                }
            }
            Completion::FolderCreated { parent_id, result } => {
                let succeeded = match result {
                    Ok(folder) => {
                        info!(id = %folder.id(), parent = %parent_id, "folder created");
                        self.emit(BrowserEvent::FolderCreated {
                            parent_id: parent_id.clone(),
                            folder,
                        });
                        self.refresh_if_current(&parent_id);
                        true
                    }
                    Err(error) => {
                        self.fail(Operation::CreateFolder, &error);
                        false
                    }
                };
                Processed::Operation {
                    operation: Operation::CreateFolder,
                    succeeded,
                }
            }
            Completion::Uploaded { parent_id, result } => {
                let succeeded = match result {
                    Ok(entry) => {
                        self.emit(BrowserEvent::Uploaded {
                            parent_id: parent_id.clone(),
                            entry,
                        });
                        self.refresh_if_current(&parent_id);
                        true
                    }
                    Err(error) => {
                        self.fail(Operation::Upload, &error);
                        false
                    }
                };
                Processed::Operation {
                    operation: Operation::Upload,
                    succeeded,
                }
            }
            Completion::Downloaded {
                file_name,
                destination,
                result,
            } => {
                let succeeded = match result {
                    Ok(bytes) => {
                        self.emit(BrowserEvent::DownloadCompleted {
                            file_name,
                            destination,
                            bytes,
                        });
                        true
                    }
                    Err(error) => {
                        self.fail(Operation::Download, &error);
                        false
                    }
                };
                Processed::Operation {
                    operation: Operation::Download,
                    succeeded,
                }
            }
        }
    }

    fn apply_listing(
        &mut self,
        ticket: FetchTicket,
        result: BrowserResult<Vec<RemoteEntry>>,
    ) -> Processed {
        let on_top = self
            .current_folder()
            .map_or(false, |folder| folder.id == ticket.folder_id);

        let pending = match self.pending.take() {
            Some(pending) if pending.ticket == ticket && on_top => pending,
            other => {
                self.pending = other;
                debug!(generation = ticket.generation, folder = %ticket.folder_id, "discarding stale listing");
                return Processed::ListingDiscarded(ticket);
            }
        };

        match result {
            Ok(entries) => {
                debug!(folder = %ticket.folder_id, count = entries.len(), "listing applied");
                let state = if entries.is_empty() {
                    ListingState::Empty
                } else {
                    ListingState::Ready(ordered_for_display(entries))
                };
                self.listing_tx.send_replace(state);
                Processed::ListingApplied(ticket)
            }
            Err(error) => {
                warn!(folder = %ticket.folder_id, error = %error, "listing failed");
                if let Some(previous) = pending.rollback {
                    debug!(folder = %previous.current().id, "rolling breadcrumb back");
                    self.breadcrumb = Some(previous);
                }
                self.listing_tx.send_replace(ListingState::Error {
                    kind: error.kind(),
                    reason: error.to_string(),
                });
                Processed::ListingFailed(ticket)
            }
        }
    }

    fn finish<F>(&mut self, operation: Operation, result: BrowserResult<()>, event: F) -> bool
    where
        F: FnOnce() -> BrowserEvent,
    {
        match result {
            Ok(()) => {
                self.emit(event());
                true
            }
            Err(error) => {
                self.fail(operation, &error);
                false
            }
        }
    }

    fn fail(&self, operation: Operation, error: &BrowserError) {
        warn!(operation = %operation, error = %error, "operation failed");
        self.emit(BrowserEvent::OperationFailed {
            operation,
            reason: error.to_string(),
        });
    }

    fn refresh_if_current(&mut self, folder_id: &str) {
        if self.current_folder().map_or(false, |f| f.id == folder_id) {
            let _ = self.refresh();
        }
    }
}

/// Makes a remote name safe to use as a single path component.
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::mocks::{GatewayCall, MockGateway};
    use crate::model::{FileEntry, FolderEntry};

    fn folder(id: &str, name: &str) -> RemoteEntry {
        RemoteEntry::Folder(FolderEntry {
            id: id.to_string(),
            name: name.to_string(),
            modified: None,
        })
    }

    fn navigator(gateway: MockGateway, permissions: Permissions) -> Navigator<MockGateway> {
        let mut navigator = Navigator::new(
            gateway,
            NavigatorOptions {
                permissions,
                ..Default::default()
            },
        );
        navigator.set_root("root", "Drive Folder").unwrap();
        navigator
    }

    #[tokio::test]
    async fn test_initialize_requires_root() {
        let mut navigator = Navigator::new(MockGateway::new(), NavigatorOptions::default());
        let error = navigator.initialize().unwrap_err();
        assert!(error.is_fatal());
        assert!(matches!(
            error,
            BrowserError::Configuration(ConfigurationError::MissingRootFolder)
        ));
        assert_eq!(navigator.state(), NavigationState::Uninitialized);
    }

    #[tokio::test]
    async fn test_root_locked_after_initialize() {
        let gateway = MockGateway::new();
        let mut navigator = navigator(gateway, Permissions::User);
        navigator.set_root("other", "Other").unwrap();
        navigator.initialize().unwrap();
        assert!(matches!(
            navigator.set_root("late", "Late"),
            Err(BrowserError::Navigation(NavigationError::RootLocked))
        ));
        assert_eq!(navigator.current_folder().unwrap().id, "other");
    }

    #[tokio::test]
    async fn test_operations_before_initialize() {
        let mut navigator = navigator(MockGateway::new(), Permissions::Admin);
        assert!(matches!(
            navigator.enter_folder("f1", "Folder1"),
            Err(BrowserError::Navigation(NavigationError::NotInitialized))
        ));
        assert!(navigator.refresh().is_err());
        assert_eq!(navigator.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_initialize_publishes_ordered_listing() {
        let gateway = MockGateway::new();
        gateway.add_file("root", "f-b", "b.txt", "text/plain", 10);
        gateway.add_folder("root", "d-z", "Zeta");
        gateway.add_file("root", "f-a", "a.txt", "text/plain", 10);

        let mut navigator = navigator(gateway, Permissions::User);
        navigator.initialize().unwrap();
        assert!(navigator.listing().is_loading());
        assert!(matches!(navigator.state(), NavigationState::Busy { .. }));

        let processed = navigator.process_next().await.unwrap();
        assert!(matches!(processed, Processed::ListingApplied(_)));
        let ids: Vec<_> = navigator.listing().entries().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["d-z", "f-a", "f-b"]);
        assert_eq!(navigator.state(), NavigationState::AtRoot);
        assert!(navigator.process_next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_folder_is_empty_state() {
        let mut navigator = navigator(MockGateway::new(), Permissions::User);
        navigator.initialize().unwrap();
        navigator.process_next().await;
        assert_eq!(navigator.listing(), ListingState::Empty);
    }

    #[tokio::test]
    async fn test_search_keeps_breadcrumb() {
        let gateway = MockGateway::new();
        gateway.add_file("root", "1", "report.pdf", "application/pdf", 1);
        gateway.add_file("root", "2", "photo.png", "image/png", 1);

        let mut navigator = navigator(gateway.clone(), Permissions::User);
        navigator.initialize().unwrap();
        navigator.process_next().await;

        assert_eq!(navigator.search("   ").unwrap(), None);
        let ticket = navigator.search("report").unwrap().unwrap();
        assert_eq!(ticket.query.as_deref(), Some("report"));
        assert_eq!(
            navigator.state(),
            NavigationState::Searching {
                query: "report".to_string()
            }
        );
        navigator.process_next().await;
        assert_eq!(navigator.listing().entries().len(), 1);
        assert_eq!(navigator.breadcrumb().unwrap().len(), 1);

        navigator.close_search().unwrap();
        navigator.process_next().await;
        assert_eq!(navigator.listing().entries().len(), 2);
        assert_eq!(
            gateway.calls().last(),
            Some(&GatewayCall::List("root".to_string()))
        );
    }

    #[tokio::test]
    async fn test_permission_denied_makes_no_call() {
        let gateway = MockGateway::new();
        let mut navigator = navigator(gateway.clone(), Permissions::Strict);
        navigator.initialize().unwrap();
        navigator.process_next().await;
        let calls_before = gateway.calls().len();

        let file = RemoteEntry::File(FileEntry {
            id: "x".to_string(),
            name: "x.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: 1,
            modified: None,
            download_locator: None,
            share_locator: Some("https://share".to_string()),
        });
        for result in [
            navigator.delete("x").map(|_| ()),
            navigator.create_folder("New").map(|_| ()),
            navigator.download(&file).map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(BrowserError::Authorization(AuthorizationError::ActionNotPermitted(_)))
            ));
        }
        assert_eq!(gateway.calls().len(), calls_before);
        assert_eq!(navigator.share_link(&file).unwrap(), "https://share");
        assert!(navigator.copy_path("x.txt").is_err());
    }

    #[tokio::test]
    async fn test_open_rejects_files_and_share_rejects_folders() {
        let mut navigator = navigator(MockGateway::new(), Permissions::User);
        navigator.initialize().unwrap();
        navigator.process_next().await;

        let dir = folder("d", "Docs");
        assert!(navigator.share_link(&dir).is_err());
        assert!(matches!(
            navigator.download(&dir),
            Err(BrowserError::Download(DownloadError::NotAFile(_)))
        ));
        navigator.open(&dir).unwrap();
        assert_eq!(navigator.current_folder().unwrap().id, "d");
    }

    #[tokio::test]
    async fn test_listing_error_kind() {
        let gateway = MockGateway::new();
        gateway.fail_listing("root", BrowserError::network("offline"));
        let mut navigator = navigator(gateway, Permissions::User);
        navigator.initialize().unwrap();

        assert!(matches!(
            navigator.process_next().await,
            Some(Processed::ListingFailed(_))
        ));
        match navigator.listing() {
            ListingState::Error { kind, reason } => {
                assert_eq!(kind, ErrorKind::Transport);
                assert!(reason.contains("offline"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_process_pending_does_not_wait() {
        let gateway = MockGateway::new();
        let release = gateway.hold_listing("root");
        let mut navigator = navigator(gateway, Permissions::User);
        navigator.initialize().unwrap();

        tokio::task::yield_now().await;
        assert_eq!(navigator.process_pending(), 0);
        assert_eq!(navigator.outstanding(), 1);

        release.notify_one();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(navigator.process_pending(), 1);
        assert_eq!(navigator.outstanding(), 0);
        assert_eq!(navigator.listing(), ListingState::Empty);
    }

    #[test]
    fn test_path_component() {
        assert_eq!(path_component("a/b"), "a_b");
        assert_eq!(path_component(".."), "_");
        assert_eq!(path_component("Report 2023.pdf"), "Report 2023.pdf");
    }
}
