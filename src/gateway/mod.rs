//! Remote directory gateway: the remote operations the navigator depends on.

use crate::client::DriveClient;
use crate::config::BrowserConfig;
use crate::errors::{BrowserResult, UploadError};
use crate::model::{FileEntry, RemoteEntry};
use crate::types::{CreateFileRequest, ListFilesParams};
use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remote store operations used by the browser.
///
/// Every call may fail; the navigator turns failures into listing state or
/// events rather than propagating them.
#[async_trait]
pub trait RemoteDirectoryGateway: Send + Sync + 'static {
    /// Lists the children of a folder.
    async fn list(&self, folder_id: &str) -> BrowserResult<Vec<RemoteEntry>>;

    /// Lists the children of a folder whose names contain `query`.
    async fn search(&self, folder_id: &str, query: &str) -> BrowserResult<Vec<RemoteEntry>>;

    /// Creates a folder and returns it.
    async fn create_folder(&self, parent_id: &str, name: &str) -> BrowserResult<RemoteEntry>;

    /// Deletes an entry.
    async fn delete(&self, entry_id: &str) -> BrowserResult<()>;

    /// Uploads a local file into a folder and returns the new entry.
    async fn upload(&self, parent_id: &str, source: &UploadSource) -> BrowserResult<RemoteEntry>;

    /// Writes a file's content to `destination`, returning the byte count.
    async fn download(&self, file: &FileEntry, destination: &Path) -> BrowserResult<u64>;
}

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSource {
    /// Local path.
    pub path: PathBuf,
    /// Name to give the remote file.
    pub name: String,
    /// Content type.
    pub mime_type: Mime,
    /// Size in bytes.
    pub size: u64,
}

impl UploadSource {
    /// Describes a local file explicitly.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, mime_type: Mime, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            mime_type,
            size,
        }
    }

    /// Describes a local file, guessing its MIME type from the extension.
    ///
    /// Fails with [`UploadError::UnsupportedMimeType`] when the extension is
    /// unknown, and [`UploadError::Io`] when the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> BrowserResult<Self> {
        let path = path.as_ref();

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Io(format!("{} has no file name", path.display())))?;

        let mime_type = mime_guess::from_path(path)
            .first()
            .ok_or_else(|| UploadError::UnsupportedMimeType(name.clone()))?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::Io(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(UploadError::Io(format!("{} is not a regular file", path.display())).into());
        }

        Ok(Self::new(path, name, mime_type, metadata.len()))
    }
}

/// Gateway backed by the Drive v3 API.
#[derive(Clone)]
pub struct DriveGateway {
    client: DriveClient,
}

impl DriveGateway {
    /// Creates a gateway over an existing client.
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    /// Creates a gateway with a reqwest-backed client.
    pub fn from_config(config: BrowserConfig) -> BrowserResult<Self> {
        Ok(Self::new(DriveClient::new(config)?))
    }

    /// Gets the underlying client.
    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    async fn list_children(
        &self,
        folder_id: &str,
        name_filter: Option<&str>,
    ) -> BrowserResult<Vec<RemoteEntry>> {
        let params = ListFilesParams::children_of(folder_id, name_filter);
        let files = self.client.files().list_all(params).await?;
        debug!(folder = %folder_id, filter = ?name_filter, count = files.len(), "listed folder");
        Ok(files.into_iter().map(RemoteEntry::from_drive_file).collect())
    }
}

#[async_trait]
impl RemoteDirectoryGateway for DriveGateway {
    async fn list(&self, folder_id: &str) -> BrowserResult<Vec<RemoteEntry>> {
        self.list_children(folder_id, None).await
    }

    async fn search(&self, folder_id: &str, query: &str) -> BrowserResult<Vec<RemoteEntry>> {
        self.list_children(folder_id, Some(query)).await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> BrowserResult<RemoteEntry> {
        let folder = self.client.files().create_folder(name, parent_id).await?;
        Ok(RemoteEntry::from_drive_file(folder))
    }

    async fn delete(&self, entry_id: &str) -> BrowserResult<()> {
        self.client.files().delete(entry_id).await
    }

    async fn upload(&self, parent_id: &str, source: &UploadSource) -> BrowserResult<RemoteEntry> {
        let files = self.client.files();
        let mime_type = source.mime_type.essence_str();
        let metadata = CreateFileRequest::file(&source.name, mime_type, parent_id);

        let uploaded = if source.size <= self.client.config().simple_upload_limit {
            let content = tokio::fs::read(&source.path)
                .await
                .map_err(|e| UploadError::Io(format!("{}: {}", source.path.display(), e)))?;
            files
                .create_multipart(metadata, Bytes::from(content), mime_type)
                .await?
        } else {
            let file = tokio::fs::File::open(&source.path)
                .await
                .map_err(|e| UploadError::Io(format!("{}: {}", source.path.display(), e)))?;
            let mut session = files
                .create_resumable(metadata, source.size, mime_type)
                .await?;
            session.upload_reader(file).await?
        };

        info!(id = %uploaded.id, name = %uploaded.name, parent = %parent_id, "uploaded file");
        Ok(RemoteEntry::from_drive_file(uploaded))
    }

    async fn download(&self, file: &FileEntry, destination: &Path) -> BrowserResult<u64> {
        self.client.files().download_to(&file.id, destination).await
    }
}
