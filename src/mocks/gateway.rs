use super::lock;
use crate::errors::{BrowserError, BrowserResult};
use crate::gateway::{RemoteDirectoryGateway, UploadSource};
use crate::model::{FileEntry, FolderEntry, RemoteEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A call received by [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `list(folder_id)`
    List(String),
    /// `search(folder_id, query)`
    Search(String, String),
    /// `create_folder(parent_id, name)`
    CreateFolder(String, String),
    /// `delete(entry_id)`
    Delete(String),
    /// `upload(parent_id, name)`
    Upload(String, String),
    /// `download(file_id)`
    Download(String),
}

#[derive(Default)]
struct State {
    children: HashMap<String, Vec<RemoteEntry>>,
    calls: Vec<GatewayCall>,
    listing_failures: HashMap<String, BrowserError>,
    operation_failure: Option<BrowserError>,
    holds: HashMap<String, Arc<Notify>>,
    next_id: u64,
}

/// In-memory folder tree.
///
/// Clones share the same tree, so a test can keep a handle after moving one
/// into a navigator.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<State>>,
}

impl MockGateway {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a folder under `parent_id`.
    pub fn add_folder(&self, parent_id: &str, id: &str, name: &str) {
        let folder = RemoteEntry::Folder(FolderEntry {
            id: id.to_string(),
            name: name.to_string(),
            modified: Some("2023-05-01T10:00:00.000Z".to_string()),
        });
        self.insert(parent_id, folder);
    }

    /// Adds a file under `parent_id`.
    pub fn add_file(&self, parent_id: &str, id: &str, name: &str, mime_type: &str, size: u64) {
        self.insert(parent_id, file_entry(id, name, mime_type, size));
    }

    /// Current children of a folder, in insertion order.
    pub fn children(&self, folder_id: &str) -> Vec<RemoteEntry> {
        lock(&self.state)
            .children
            .get(folder_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.state).calls.clone()
    }

    /// Makes the next listing or search of `folder_id` fail with `error`.
    pub fn fail_listing(&self, folder_id: &str, error: BrowserError) {
        lock(&self.state)
            .listing_failures
            .insert(folder_id.to_string(), error);
    }

    /// Makes the next create, delete, upload or download fail with `error`.
    pub fn fail_next_operation(&self, error: BrowserError) {
        lock(&self.state).operation_failure = Some(error);
    }

    /// Holds the next listing or search of `folder_id` until the returned
    /// handle is notified.
    pub fn hold_listing(&self, folder_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.state)
            .holds
            .insert(folder_id.to_string(), notify.clone());
        notify
    }

    fn insert(&self, parent_id: &str, entry: RemoteEntry) {
        lock(&self.state)
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(entry);
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.state).calls.push(call);
    }

    fn take_operation_failure(&self) -> BrowserResult<()> {
        match lock(&self.state).operation_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = lock(&self.state);
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }

    async fn children_matching(
        &self,
        folder_id: &str,
        query: Option<&str>,
    ) -> BrowserResult<Vec<RemoteEntry>> {
        let hold = lock(&self.state).holds.remove(folder_id);
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let mut state = lock(&self.state);
        if let Some(error) = state.listing_failures.remove(folder_id) {
            return Err(error);
        }
        let children = state.children.get(folder_id).cloned().unwrap_or_default();
        Ok(match query {
            Some(query) => {
                let needle = query.to_lowercase();
                children
                    .into_iter()
                    .filter(|entry| entry.name().to_lowercase().contains(&needle))
                    .collect()
            }
            None => children,
        })
    }
}

fn file_entry(id: &str, name: &str, mime_type: &str, size: u64) -> RemoteEntry {
    RemoteEntry::File(FileEntry {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size,
        modified: Some("2023-05-01T10:00:00.000Z".to_string()),
        download_locator: Some(format!("https://drive.mock/uc?id={}", id)),
        share_locator: Some(format!("https://drive.mock/file/d/{}/view", id)),
    })
}

#[async_trait]
impl RemoteDirectoryGateway for MockGateway {
    async fn list(&self, folder_id: &str) -> BrowserResult<Vec<RemoteEntry>> {
        self.record(GatewayCall::List(folder_id.to_string()));
        self.children_matching(folder_id, None).await
    }

    async fn search(&self, folder_id: &str, query: &str) -> BrowserResult<Vec<RemoteEntry>> {
        self.record(GatewayCall::Search(folder_id.to_string(), query.to_string()));
        self.children_matching(folder_id, Some(query)).await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> BrowserResult<RemoteEntry> {
        self.record(GatewayCall::CreateFolder(parent_id.to_string(), name.to_string()));
        self.take_operation_failure()?;

        let id = self.next_id("folder");
        self.add_folder(parent_id, &id, name);
        Ok(RemoteEntry::Folder(FolderEntry {
            id,
            name: name.to_string(),
            modified: Some("2023-05-01T10:00:00.000Z".to_string()),
        }))
    }

    async fn delete(&self, entry_id: &str) -> BrowserResult<()> {
        self.record(GatewayCall::Delete(entry_id.to_string()));
        self.take_operation_failure()?;

        let mut state = lock(&self.state);
        let mut removed = false;
        for children in state.children.values_mut() {
            let before = children.len();
            children.retain(|entry| entry.id() != entry_id);
            removed |= children.len() != before;
        }
        if removed {
            state.children.remove(entry_id);
            Ok(())
        } else {
            Err(BrowserError::not_found(format!("File not found: {}", entry_id)))
        }
    }

    async fn upload(&self, parent_id: &str, source: &UploadSource) -> BrowserResult<RemoteEntry> {
        self.record(GatewayCall::Upload(parent_id.to_string(), source.name.clone()));
        self.take_operation_failure()?;

        let id = self.next_id("file");
        let entry = file_entry(&id, &source.name, source.mime_type.essence_str(), source.size);
        self.insert(parent_id, entry.clone());
        Ok(entry)
    }

    async fn download(&self, file: &FileEntry, destination: &Path) -> BrowserResult<u64> {
        self.record(GatewayCall::Download(file.id.clone()));
        self.take_operation_failure()?;

        let io_error = |e: std::io::Error| crate::errors::DownloadError::Io {
            path: destination.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = format!("contents of {}", file.name);
        tokio::fs::write(destination, content.as_bytes())
            .await
            .map_err(io_error)?;
        Ok(content.len() as u64)
    }
}
