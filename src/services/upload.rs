//! Multipart and resumable uploads.
//!
//! Small files go up in one `multipart/related` request. Larger ones open a
//! resumable session and are sent in chunks with `Content-Range`; the server
//! answers `308` with the persisted range until the final chunk lands.

use crate::client::{map_error_response, RequestExecutor};
use crate::config::UPLOAD_CHUNK_GRANULARITY;
use crate::errors::{BrowserError, BrowserResult, UploadError};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, RelatedBody, RequestBody};
use crate::types::{CreateFileRequest, DriveFile, FILE_FIELDS};
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};
use url::Url;

/// Starts uploads against the upload endpoint.
pub struct UploadService {
    executor: Arc<RequestExecutor>,
}

impl UploadService {
    /// Shares the client's executor.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// One request carrying both metadata and content.
    pub async fn multipart_upload(
        &self,
        metadata: CreateFileRequest,
        content: Bytes,
        mime_type: &str,
    ) -> BrowserResult<DriveFile> {
        let url = self.upload_url("multipart")?;
        debug!(name = %metadata.name, bytes = content.len(), mime_type, "multipart upload");

        let mut request = HttpRequest::new(HttpMethod::Post, url);
        request.body = Some(RequestBody::Related(RelatedBody::new(
            metadata_json(&metadata)?,
            content,
            mime_type,
        )));
        self.executor.execute_json(request).await
    }

    /// Opens a resumable session for `content_length` bytes of `mime_type`.
    pub async fn initiate_resumable(
        &self,
        metadata: CreateFileRequest,
        content_length: u64,
        mime_type: &str,
    ) -> BrowserResult<ResumableUploadSession> {
        let mut request = HttpRequest::new(HttpMethod::Post, self.upload_url("resumable")?);
        let declared_type = HeaderValue::from_str(mime_type)
            .map_err(|e| BrowserError::request(format!("unusable MIME type '{}': {}", mime_type, e)))?;
        request.headers.insert("X-Upload-Content-Type", declared_type);
        request
            .headers
            .insert("X-Upload-Content-Length", HeaderValue::from(content_length));
        request.body = Some(RequestBody::Json(metadata_json(&metadata)?));

        let response = self.executor.execute(request).await?;
        let session_uri = session_uri(&response)?;
        info!(name = %metadata.name, total_size = content_length, "resumable upload session opened");

        ResumableUploadSession::new(
            self.executor.clone(),
            session_uri,
            content_length,
            self.executor.config().upload_chunk_size,
        )
    }

    fn upload_url(&self, upload_type: &str) -> BrowserResult<Url> {
        self.executor.build_upload_url(
            "files",
            Some(&[("uploadType", upload_type), ("fields", FILE_FIELDS)]),
        )
    }
}

fn metadata_json(metadata: &CreateFileRequest) -> BrowserResult<Bytes> {
    serde_json::to_vec(metadata)
        .map(Bytes::from)
        .map_err(|e| BrowserError::request(format!("could not encode file metadata: {}", e)))
}

fn session_uri(response: &HttpResponse) -> BrowserResult<Url> {
    let location = response
        .headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| UploadError::SessionNotStarted("no Location header".to_string()))?;
    Url::parse(location).map_err(|e| {
        UploadError::SessionNotStarted(format!("bad session URI '{}': {}", location, e)).into()
    })
}

/// Where a chunk left the upload.
enum Progress {
    Persisted(u64),
    Done(DriveFile),
}

/// An open resumable upload.
pub struct ResumableUploadSession {
    executor: Arc<RequestExecutor>,
    uri: Url,
    total_size: u64,
    acknowledged: u64,
    chunk_size: usize,
}

impl ResumableUploadSession {
    /// Wraps an already-opened session URI.
    pub fn new(
        executor: Arc<RequestExecutor>,
        uri: Url,
        total_size: u64,
        chunk_size: usize,
    ) -> BrowserResult<Self> {
        if chunk_size == 0 || chunk_size % UPLOAD_CHUNK_GRANULARITY != 0 {
            return Err(BrowserError::configuration(format!(
                "upload chunk size {} is not a multiple of {} bytes",
                chunk_size, UPLOAD_CHUNK_GRANULARITY
            )));
        }

        Ok(Self {
            executor,
            uri,
            total_size,
            acknowledged: 0,
            chunk_size,
        })
    }

    /// Bytes the server has confirmed.
    pub fn bytes_uploaded(&self) -> u64 {
        self.acknowledged
    }

    /// Streams `reader` to the session, which must yield exactly the declared
    /// size. Bytes the server did not persist are resent with the next chunk.
    pub async fn upload_reader<R>(&mut self, mut reader: R) -> BrowserResult<DriveFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut eof = false;

        loop {
            while !eof && buffer.len() < self.chunk_size {
                let mut limited = (&mut reader).take((self.chunk_size - buffer.len()) as u64);
                let read = limited
                    .read_buf(&mut buffer)
                    .await
                    .map_err(|e| UploadError::Io(e.to_string()))?;
                eof = read == 0;
            }

            if buffer.is_empty() {
                return Err(UploadError::UploadInterrupted(format!(
                    "source ended after {} of {} bytes",
                    self.acknowledged, self.total_size
                ))
                .into());
            }

            let offset = self.acknowledged;
            match self.send_chunk(Bytes::copy_from_slice(&buffer), offset).await? {
                Progress::Done(file) => return Ok(file),
                Progress::Persisted(persisted) => {
                    let consumed = persisted.saturating_sub(offset) as usize;
                    let _ = buffer.split_to(consumed.min(buffer.len()));
                    self.acknowledged = persisted;
                }
            }
        }
    }

    async fn send_chunk(&mut self, chunk: Bytes, offset: u64) -> BrowserResult<Progress> {
        let len = chunk.len() as u64;
        let range = format!("bytes {}-{}/{}", offset, offset + len - 1, self.total_size);
        debug!(range = %range, "uploading chunk");

        let mut request = HttpRequest::new(HttpMethod::Put, self.uri.clone());
        request.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        request.headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&range)
                .map_err(|e| BrowserError::request(format!("bad Content-Range: {}", e)))?,
        );
        request.body = Some(RequestBody::Chunk(chunk));

        let response = match self.executor.send(request).await {
            Ok(response) => response,
            Err(BrowserError::Network(err)) => {
                return Err(UploadError::UploadInterrupted(err.to_string()).into())
            }
            Err(other) => return Err(other),
        };

        match response.status {
            StatusCode::OK | StatusCode::CREATED => {
                let file: DriveFile = serde_json::from_slice(&response.body).map_err(|e| {
                    BrowserError::deserialization(format!("uploaded file metadata: {}", e))
                })?;
                self.acknowledged = self.total_size;
                info!(id = %file.id, total_size = self.total_size, "resumable upload completed");
                Ok(Progress::Done(file))
            }
            StatusCode::PERMANENT_REDIRECT => Ok(Progress::Persisted(persisted_bytes(&response))),
            status if status.is_server_error() => {
                warn!(status = status.as_u16(), "upload chunk rejected by server");
                Err(UploadError::UploadInterrupted(format!("server answered {}", status)).into())
            }
            _ => Err(map_error_response(&response)),
        }
    }
}

/// Persisted byte count from a `Range: bytes=0-N` header; none persisted
/// when it is absent.
fn persisted_bytes(response: &HttpResponse) -> u64 {
    response
        .headers
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|range| range.strip_prefix("bytes=0-"))
        .and_then(|last| last.parse::<u64>().ok())
        .map_or(0, |last| last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;
    use crate::mocks::{MockAuthProvider, MockResponse, MockTransport};
    use reqwest::header::CONTENT_TYPE;

    const CHUNK: usize = UPLOAD_CHUNK_GRANULARITY;

    fn executor(transport: Arc<MockTransport>) -> Arc<RequestExecutor> {
        let config = BrowserConfig::builder()
            .auth_provider(MockAuthProvider::new("token"))
            .upload_chunk_size(CHUNK)
            .build()
            .unwrap();
        Arc::new(RequestExecutor::new(config, transport))
    }

    fn session(transport: &Arc<MockTransport>, total: u64) -> ResumableUploadSession {
        let uri = Url::parse("https://upload.example.com/session/1").unwrap();
        ResumableUploadSession::new(executor(transport.clone()), uri, total, CHUNK).unwrap()
    }

    #[tokio::test]
    async fn test_multipart_upload_request() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::ok_with_body(
            r#"{"id":"new","name":"a.txt","mimeType":"text/plain"}"#,
        ));
        let service = UploadService::new(executor(transport.clone()));

        let file = service
            .multipart_upload(
                CreateFileRequest::file("a.txt", "text/plain", "parent"),
                Bytes::from("hello"),
                "text/plain",
            )
            .await
            .unwrap();
        assert_eq!(file.id, "new");

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.query_param("uploadType").as_deref(), Some("multipart"));
        let content_type = request.headers.get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/related; boundary="));
    }

    #[tokio::test]
    async fn test_initiate_declares_size_and_type() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            MockResponse::ok().with_header("location", "https://upload.example.com/s/9"),
        );
        let service = UploadService::new(executor(transport.clone()));

        let session = service
            .initiate_resumable(CreateFileRequest::file("big", "video/mp4", "p"), 10, "video/mp4")
            .await
            .unwrap();
        assert_eq!(session.bytes_uploaded(), 0);

        let request = transport.last_request().unwrap();
        assert_eq!(request.query_param("uploadType").as_deref(), Some("resumable"));
        assert_eq!(request.headers.get("X-Upload-Content-Type").unwrap(), "video/mp4");
        assert_eq!(request.headers.get("X-Upload-Content-Length").unwrap(), "10");
    }

    #[tokio::test]
    async fn test_initiate_requires_location() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::ok());
        let service = UploadService::new(executor(transport));

        let result = service
            .initiate_resumable(CreateFileRequest::file("big", "video/mp4", "p"), 10, "video/mp4")
            .await;
        assert!(matches!(
            result,
            Err(BrowserError::Upload(UploadError::SessionNotStarted(_)))
        ));
    }

    #[tokio::test]
    async fn test_resumable_upload_in_chunks() {
        let transport = Arc::new(MockTransport::new());
        let total = CHUNK as u64 + 10;
        transport.push_response(
            MockResponse::with_status(308).with_header("range", &format!("bytes=0-{}", CHUNK - 1)),
        );
        transport.push_response(MockResponse::ok_with_body(
            r#"{"id":"big","name":"big.bin","mimeType":"application/octet-stream"}"#,
        ));

        let mut session = session(&transport, total);
        let content = vec![7u8; total as usize];
        let file = session.upload_reader(&content[..]).await.unwrap();

        assert_eq!(file.id, "big");
        assert_eq!(session.bytes_uploaded(), total);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].headers.get(CONTENT_RANGE).unwrap(),
            &format!("bytes 0-{}/{}", CHUNK - 1, total)
        );
        assert_eq!(
            requests[1].headers.get(CONTENT_RANGE).unwrap(),
            &format!("bytes {}-{}/{}", CHUNK, total - 1, total)
        );
        assert_eq!(
            requests[1].headers.get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_partially_persisted_chunk_is_resent() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::with_status(308).with_header("range", "bytes=0-3"));
        transport.push_response(MockResponse::ok_with_body(
            r#"{"id":"f","name":"f.bin","mimeType":"application/octet-stream"}"#,
        ));

        let mut session = session(&transport, 10);
        session.upload_reader(&b"0123456789"[..]).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[1].headers.get(CONTENT_RANGE).unwrap(), "bytes 4-9/10");
        assert_eq!(requests[1].body.as_ref().unwrap().to_bytes(), Bytes::from("456789"));
    }

    #[tokio::test]
    async fn test_short_source_is_interrupted() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::with_status(308).with_header("range", "bytes=0-2"));

        let result = session(&transport, 100).upload_reader(&b"abc"[..]).await;
        assert!(matches!(
            result,
            Err(BrowserError::Upload(UploadError::UploadInterrupted(_)))
        ));
    }

    #[tokio::test]
    async fn test_server_error_interrupts_upload() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::with_status(503));

        let result = session(&transport, 3).upload_reader(&b"abc"[..]).await;
        assert!(matches!(
            result,
            Err(BrowserError::Upload(UploadError::UploadInterrupted(_)))
        ));
    }

    #[test]
    fn test_rejects_bad_chunk_size() {
        let transport = Arc::new(MockTransport::new());
        let uri = Url::parse("https://upload.example.com/session/1").unwrap();
        assert!(ResumableUploadSession::new(executor(transport), uri, 3, 1000).is_err());
    }
}
