//! Files service: listing, folders, deletion, uploads and downloads.

use crate::client::{encode_segment, RequestExecutor};
use crate::config::MAX_PAGE_SIZE;
use crate::errors::{BrowserError, BrowserResult, DownloadError, RequestError};
use crate::pagination::{Page, PageIterator};
use crate::services::upload::{ResumableUploadSession, UploadService};
use crate::transport::{ByteStream, HttpMethod, HttpRequest, RequestBody};
use crate::types::{CreateFileRequest, DriveFile, FileList, ListFilesParams, FILE_FIELDS};
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

/// Service for file operations.
pub struct FilesService {
    executor: Arc<RequestExecutor>,
}

impl FilesService {
    /// Creates a new files service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Fetches one page of `files.list`.
    pub async fn list(&self, params: ListFilesParams) -> BrowserResult<FileList> {
        if let Some(page_size) = params.page_size {
            if page_size == 0 || page_size > MAX_PAGE_SIZE {
                return Err(RequestError::InvalidParameter(format!(
                    "pageSize must be between 1 and {}",
                    MAX_PAGE_SIZE
                ))
                .into());
            }
        }

        let url = self.executor.build_url("files", Some(&params))?;
        self.executor
            .execute_json(HttpRequest::new(HttpMethod::Get, url))
            .await
    }

    /// Fetches one page as a [`Page`].
    pub async fn list_page(
        &self,
        params: ListFilesParams,
        page_token: Option<String>,
    ) -> BrowserResult<Page<DriveFile>> {
        let list = self.list(params.with_page_token(page_token)).await?;
        Ok(Page::new(list.files, list.next_page_token).incomplete(list.incomplete_search))
    }

    /// Lists every matching file, following `nextPageToken` until exhausted.
    ///
    /// Uses the configured page size when `params` does not set one.
    pub async fn list_all(&self, params: ListFilesParams) -> BrowserResult<Vec<DriveFile>> {
        let params = match params.page_size {
            Some(_) => params,
            None => params.with_page_size(self.executor.config().page_size),
        };

        let mut pages =
            PageIterator::new(|token| self.list_page(params.clone(), token));
        let files = pages.collect_all().await?;

        debug!(count = files.len(), "listed files");
        Ok(files)
    }

    /// Creates a folder inside `parent_id`.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> BrowserResult<DriveFile> {
        if name.trim().is_empty() {
            return Err(BrowserError::missing_parameter("folder name is required"));
        }

        let body = RequestBody::json(&CreateFileRequest::folder(name, parent_id))
            .map_err(|e| BrowserError::request(format!("Failed to serialize request: {}", e)))?;

        let url = self.executor.build_url("files", Some(&[("fields", FILE_FIELDS)]))?;
        let mut request = HttpRequest::new(HttpMethod::Post, url);
        request.body = Some(body);

        let folder: DriveFile = self.executor.execute_json(request).await?;
        info!(id = %folder.id, name = %folder.name, parent = %parent_id, "created folder");
        Ok(folder)
    }

    /// Permanently deletes a file or folder.
    pub async fn delete(&self, file_id: &str) -> BrowserResult<()> {
        if file_id.is_empty() {
            return Err(BrowserError::missing_parameter("file_id is required"));
        }

        let url = self.executor.build_url::<()>(
            &format!("files/{}", encode_segment(file_id)),
            None,
        )?;
        self.executor
            .execute(HttpRequest::new(HttpMethod::Delete, url))
            .await?;

        info!(id = %file_id, "deleted file");
        Ok(())
    }

    /// Uploads `content` in a single multipart request.
    pub async fn create_multipart(
        &self,
        metadata: CreateFileRequest,
        content: Bytes,
        mime_type: &str,
    ) -> BrowserResult<DriveFile> {
        if metadata.name.is_empty() {
            return Err(BrowserError::missing_parameter("name is required"));
        }

        UploadService::new(self.executor.clone())
            .multipart_upload(metadata, content, mime_type)
            .await
    }

    /// Opens a resumable upload session.
    pub async fn create_resumable(
        &self,
        metadata: CreateFileRequest,
        content_length: u64,
        mime_type: &str,
    ) -> BrowserResult<ResumableUploadSession> {
        if metadata.name.is_empty() {
            return Err(BrowserError::missing_parameter("name is required"));
        }

        UploadService::new(self.executor.clone())
            .initiate_resumable(metadata, content_length, mime_type)
            .await
    }

    /// Streams a file's content.
    pub async fn download_stream(&self, file_id: &str) -> BrowserResult<ByteStream> {
        if file_id.is_empty() {
            return Err(BrowserError::missing_parameter("file_id is required"));
        }

        let url = self.executor.build_url(
            &format!("files/{}", encode_segment(file_id)),
            Some(&[("alt", "media")]),
        )?;
        self.executor
            .execute_streaming(HttpRequest::new(HttpMethod::Get, url))
            .await
    }

    /// Streams a file's content into `destination`, creating parent
    /// directories. Returns the number of bytes written.
    ///
    /// A partially written file is removed on failure.
    pub async fn download_to(&self, file_id: &str, destination: &Path) -> BrowserResult<u64> {
        let stream = self.download_stream(file_id).await?;

        let io_error = |e: io::Error| {
            BrowserError::Download(DownloadError::Io {
                path: destination.display().to_string(),
                message: e.to_string(),
            })
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(io_error)?;
        let mut reader = StreamReader::new(
            stream.map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e))),
        );

        match tokio::io::copy(&mut reader, &mut file).await {
            Ok(bytes) => {
                info!(id = %file_id, bytes, path = %destination.display(), "downloaded file");
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(destination).await;
                Err(io_error(e))
            }
        }
    }
}
