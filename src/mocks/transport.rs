use super::lock;
use crate::errors::TransportError;
use crate::transport::{ByteStream, HttpRequest, HttpResponse, HttpTransport, StreamingResponse};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// Creates an empty response with the given status.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with no body.
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// 200 with a body; JSON bodies are labelled as such.
    pub fn ok_with_body(body: &str) -> Self {
        let response = Self {
            body: Bytes::from(body.to_string()),
            ..Self::ok()
        };
        if body.trim_start().starts_with('{') {
            response.with_header("content-type", "application/json; charset=UTF-8")
        } else {
            response
        }
    }

    /// 204 with no body.
    pub fn no_content() -> Self {
        Self::with_status(204)
    }

    /// A Google API error document.
    pub fn error(status: u16, reason: &str, message: &str) -> Self {
        let body = serde_json::json!({
            "error": {
                "code": status,
                "message": message,
                "errors": [{ "domain": "global", "reason": reason, "message": message }]
            }
        });
        Self {
            body: Bytes::from(body.to_string()),
            ..Self::with_status(status)
        }
        .with_header("content-type", "application/json; charset=UTF-8")
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn into_parts(self) -> Result<(StatusCode, HeaderMap, Bytes), TransportError> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| TransportError::Http(format!("bad mock status: {}", e)))?;
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Http(format!("bad mock header: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Http(format!("bad mock header: {}", e)))?;
            headers.append(name, value);
        }
        if !headers.contains_key(CONTENT_TYPE) && !self.body.is_empty() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        }
        Ok((status, headers, self.body))
    }
}

/// Transport that replays queued responses and records every request.
///
/// Requests made after the queue runs dry fail with a network error.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<MockResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Creates a transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: TransportError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Number of requests sent.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next(&self, request: HttpRequest) -> Result<(StatusCode, HeaderMap, Bytes), TransportError> {
        lock(&self.requests).push(request);
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no mock response queued".to_string())))?
            .into_parts()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (status, headers, body) = self.next(request)?;
        Ok(HttpResponse::new(status, headers, body))
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let (status, headers, body) = self.next(request)?;
        Ok(StreamingResponse {
            status,
            headers,
            body: ByteStream::once(body),
        })
    }
}
