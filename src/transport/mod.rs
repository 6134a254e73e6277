//! HTTP plumbing under the request executor.
//!
//! [`HttpTransport`] is the seam tests replace with
//! [`MockTransport`](crate::mocks::MockTransport); [`ReqwestTransport`] is the
//! production implementation.

use crate::config::BrowserConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use pin_project::pin_project;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use url::Url;

/// Sends requests to Drive.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and reads the whole body.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Sends `request` and hands back the body unread, whatever the status.
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError>;
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Verb.
    pub method: HttpMethod,
    /// Absolute URL including the query.
    pub url: Url,
    /// Headers; the executor adds auth and content type.
    pub headers: HeaderMap,
    /// Payload, if any.
    pub body: Option<RequestBody>,
    /// Overrides the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// A bare request with no headers or body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Decoded value of the first `name` query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find_map(|(key, value)| (key == name).then(|| value.into_owned()))
    }
}

/// The verbs the Drive calls use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Listing, metadata and `alt=media` downloads.
    Get,
    /// Folder creation and upload starts.
    Post,
    /// Resumable upload chunks.
    Put,
    /// Removal.
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Request payloads. Each kind implies its own `Content-Type`.
#[derive(Clone)]
pub enum RequestBody {
    /// Serialized JSON metadata.
    Json(Bytes),
    /// Raw file bytes, such as one resumable upload chunk.
    Chunk(Bytes),
    /// Metadata and content in one `multipart/related` body.
    Related(RelatedBody),
}

impl RequestBody {
    /// Serializes `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(|json| RequestBody::Json(Bytes::from(json)))
    }

    /// The `Content-Type` this body is sent with.
    pub fn content_type(&self) -> Result<HeaderValue, TransportError> {
        match self {
            RequestBody::Json(_) => Ok(HeaderValue::from_static("application/json; charset=UTF-8")),
            RequestBody::Chunk(_) => Ok(HeaderValue::from_static("application/octet-stream")),
            RequestBody::Related(related) => HeaderValue::from_str(&related.content_type_header())
                .map_err(|e| TransportError::Http(format!("bad multipart boundary: {}", e))),
        }
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Json(bytes) | RequestBody::Chunk(bytes) => bytes.clone(),
            RequestBody::Related(related) => related.encode(),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Json(bytes) => write!(f, "Json({} bytes)", bytes.len()),
            RequestBody::Chunk(bytes) => write!(f, "Chunk({} bytes)", bytes.len()),
            RequestBody::Related(related) => write!(
                f,
                "Related({} + {} bytes of {})",
                related.metadata.len(),
                related.content.len(),
                related.content_type
            ),
        }
    }
}

static NEXT_BOUNDARY: AtomicU64 = AtomicU64::new(1);

/// A two-part `multipart/related` upload: JSON metadata, then the file.
#[derive(Clone)]
pub struct RelatedBody {
    /// File metadata as JSON.
    pub metadata: Bytes,
    /// File bytes.
    pub content: Bytes,
    /// MIME type of `content`.
    pub content_type: String,
    /// Separator between parts.
    pub boundary: String,
}

impl RelatedBody {
    /// Pairs metadata with content under a fresh boundary.
    pub fn new(metadata: Bytes, content: Bytes, content_type: impl Into<String>) -> Self {
        let boundary = format!(
            "drive_browser_{}_{:016x}",
            std::process::id(),
            NEXT_BOUNDARY.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            metadata,
            content,
            content_type: content_type.into(),
            boundary,
        }
    }

    /// `multipart/related; boundary=...`
    pub fn content_type_header(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    /// Lays out both parts with CRLF framing.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.metadata.len() + self.content.len() + 192);
        let parts: [(&str, &Bytes); 2] = [
            ("application/json; charset=UTF-8", &self.metadata),
            (&self.content_type, &self.content),
        ];

        for (content_type, payload) in parts {
            out.put_slice(format!("--{}\r\nContent-Type: {}\r\n\r\n", self.boundary, content_type).as_bytes());
            out.put_slice(payload);
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("--{}--", self.boundary).as_bytes());
        out.freeze()
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status line code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Entire body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Assembles a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// A response whose body is still on the wire.
pub struct StreamingResponse {
    /// Status line code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Unread body.
    pub body: ByteStream,
}

impl StreamingResponse {
    /// Drains the body, used to read error envelopes.
    pub async fn collect(self) -> Result<HttpResponse, TransportError> {
        let mut body = BytesMut::new();
        let mut stream = self.body;
        while let Some(chunk) = stream.next().await {
            body.put(chunk?);
        }
        Ok(HttpResponse::new(self.status, self.headers, body.freeze()))
    }
}

/// Chunks of a download body.
#[pin_project]
pub struct ByteStream {
    #[pin]
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
}

impl ByteStream {
    /// Wraps any chunk stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A body delivered as one chunk.
    pub fn once(bytes: Bytes) -> Self {
        Self::new(futures::stream::once(async move { Ok(bytes) }))
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// [`HttpTransport`] over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a client with the configured timeouts and user agent.
    pub fn from_config(config: &BrowserConfig) -> Result<Self, TransportError> {
        Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map(|client| Self { client })
            .map_err(|e| TransportError::Http(format!("could not build HTTP client: {}", e)))
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_bytes());
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self.prepare(request).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(HttpResponse::new(status, headers, body))
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let response = self.prepare(request).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = ByteStream::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| TransportError::Network(format!("body read failed: {}", e)))),
        );
        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_related_body_layout() {
        let related = RelatedBody::new(
            Bytes::from(r#"{"name":"notes.txt"}"#),
            Bytes::from("Hello, World!"),
            "text/plain",
        );
        let encoded = related.encode();
        let text = String::from_utf8_lossy(&encoded);
        let b = &related.boundary;

        assert_eq!(
            text,
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{{\"name\":\"notes.txt\"}}\r\n\
                 --{b}\r\nContent-Type: text/plain\r\n\r\nHello, World!\r\n--{b}--"
            )
        );
        assert_eq!(
            related.content_type_header(),
            format!("multipart/related; boundary={}", b)
        );
    }

    #[test]
    fn test_boundaries_are_unique() {
        let a = RelatedBody::new(Bytes::new(), Bytes::new(), "text/plain");
        let b = RelatedBody::new(Bytes::new(), Bytes::new(), "text/plain");
        assert_ne!(a.boundary, b.boundary);
    }

    #[test]
    fn test_body_content_types() {
        let json = RequestBody::json(&serde_json::json!({"name": "x"})).unwrap();
        assert_eq!(json.content_type().unwrap(), "application/json; charset=UTF-8");
        assert_eq!(json.to_bytes(), Bytes::from(r#"{"name":"x"}"#));

        let chunk = RequestBody::Chunk(Bytes::from_static(b"\x00\x01"));
        assert_eq!(chunk.content_type().unwrap(), "application/octet-stream");

        let related = RelatedBody::new(Bytes::new(), Bytes::new(), "image/png");
        let header = RequestBody::Related(related.clone()).content_type().unwrap();
        assert_eq!(header.to_str().unwrap(), related.content_type_header());
    }

    #[test]
    fn test_query_param() {
        let url = Url::parse("https://example.com/files?q=a%20b&pageSize=10").unwrap();
        let request = HttpRequest::new(HttpMethod::Get, url);
        assert_eq!(request.query_param("q").as_deref(), Some("a b"));
        assert_eq!(request.query_param("pageSize").as_deref(), Some("10"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[tokio::test]
    async fn test_streaming_response_collect() {
        let response = StreamingResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: ByteStream::new(futures::stream::iter(vec![
                Ok(Bytes::from("ab")),
                Ok(Bytes::from("cd")),
            ])),
        };
        let collected = response.collect().await.unwrap();
        assert_eq!(collected.body, Bytes::from("abcd"));
    }
}
