//! Request executor with auth and error mapping.

use crate::auth::AuthProvider;
use crate::config::BrowserConfig;
use crate::errors::{
    AuthenticationError, AuthorizationError, BrowserError, BrowserResult, QuotaError,
    RequestError, ResourceError, ServerError,
};
use crate::transport::{ByteStream, HttpRequest, HttpResponse, HttpTransport};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Characters left unescaped in a single path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a value for use as one URL path segment.
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Executes Drive API requests.
///
/// Adds the bearer token and content type, sends through the transport and
/// maps error statuses to [`BrowserError`]s.
pub struct RequestExecutor {
    config: BrowserConfig,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(config: BrowserConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let auth = config.auth_provider.clone();
        Self {
            config,
            transport,
            auth,
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Builds an API URL from a relative path and optional query parameters.
    pub fn build_url<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: Option<&Q>,
    ) -> BrowserResult<Url> {
        join_with_query(&self.config.base_url, path, query)
    }

    /// Builds an upload URL from a relative path and optional query parameters.
    pub fn build_upload_url<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: Option<&Q>,
    ) -> BrowserResult<Url> {
        join_with_query(&self.config.upload_url, path, query)
    }

    /// Sends a request without checking its status.
    pub async fn send(&self, request: HttpRequest) -> BrowserResult<HttpResponse> {
        let request = self.prepare(request).await?;
        debug!(method = ?request.method, url = %request.url, "sending drive request");
        Ok(self.transport.send(request).await?)
    }

    /// Sends a request and fails on any non-success status.
    pub async fn execute(&self, request: HttpRequest) -> BrowserResult<HttpResponse> {
        let response = self.send(request).await?;
        if !response.status.is_success() {
            let error = map_error_response(&response);
            warn!(status = response.status.as_u16(), error = %error, "drive request failed");
            return Err(error);
        }
        Ok(response)
    }

    /// Sends a request and deserializes the JSON response.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: HttpRequest) -> BrowserResult<T> {
        let response = self.execute(request).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            BrowserError::deserialization(format!("Failed to deserialize response: {}", e))
        })
    }

    /// Sends a request and returns the successful response body as a stream.
    pub async fn execute_streaming(&self, request: HttpRequest) -> BrowserResult<ByteStream> {
        let request = self.prepare(request).await?;
        debug!(method = ?request.method, url = %request.url, "sending streaming drive request");

        let response = self.transport.send_streaming(request).await?;
        if !response.status.is_success() {
            let response = response.collect().await?;
            let error = map_error_response(&response);
            warn!(status = response.status.as_u16(), error = %error, "drive download failed");
            return Err(error);
        }
        Ok(response.body)
    }

    async fn prepare(&self, mut request: HttpRequest) -> BrowserResult<HttpRequest> {
        let token = self.auth.get_access_token().await?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.token.expose_secret()))
            .map_err(|e| BrowserError::request(format!("Invalid auth header: {}", e)))?;
        request.headers.insert(AUTHORIZATION, bearer);

        if let Some(body) = &request.body {
            if !request.headers.contains_key(CONTENT_TYPE) {
                let content_type = body.content_type()?;
                request.headers.insert(CONTENT_TYPE, content_type);
            }
        }

        if request.timeout.is_none() {
            request.timeout = Some(self.config.timeout);
        }

        Ok(request)
    }
}

fn join_with_query<Q: Serialize + ?Sized>(
    base: &Url,
    path: &str,
    query: Option<&Q>,
) -> BrowserResult<Url> {
    let mut url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| BrowserError::request(format!("Invalid URL: {}", e)))?;

    if let Some(query) = query {
        let encoded = serde_urlencoded::to_string(query)
            .map_err(|e| BrowserError::request(format!("Invalid query parameters: {}", e)))?;
        if !encoded.is_empty() {
            url.set_query(Some(&encoded));
        }
    }

    Ok(url)
}

/// Parses the `Retry-After` header as whole seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Maps an error response to a [`BrowserError`] by status and Drive reason code.
pub fn map_error_response(response: &HttpResponse) -> BrowserError {
    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
        errors: Option<Vec<ErrorItem>>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorItem {
        reason: Option<String>,
    }

    let status = response.status;
    let (message, reason) = match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(parsed) => {
            let reason = parsed
                .error
                .errors
                .and_then(|errs| errs.into_iter().next())
                .and_then(|err| err.reason);
            (parsed.error.message, reason)
        }
        Err(_) => (
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&response.body)
            ),
            None,
        ),
    };
    let retry_after = retry_after(&response.headers);

    match status {
        StatusCode::BAD_REQUEST => match reason.as_deref() {
            Some("invalidParameter") => RequestError::InvalidParameter(message).into(),
            Some("invalidQuery") => RequestError::InvalidQuery(message).into(),
            _ => RequestError::ValidationError(message).into(),
        },
        StatusCode::UNAUTHORIZED => AuthenticationError::InvalidToken(message).into(),
        StatusCode::FORBIDDEN => match reason.as_deref() {
            Some("userRateLimitExceeded") | Some("rateLimitExceeded") => {
                QuotaError::RateLimitExceeded {
                    message,
                    retry_after,
                }
                .into()
            }
            Some("storageQuotaExceeded") => QuotaError::StorageQuotaExceeded(message).into(),
            Some("insufficientPermissions") | Some("insufficientFilePermissions") => {
                AuthorizationError::InsufficientPermissions(message).into()
            }
            Some("domainPolicy") => AuthorizationError::DomainPolicy(message).into(),
            _ => AuthorizationError::Forbidden(message).into(),
        },
        StatusCode::NOT_FOUND => ResourceError::FileNotFound(message).into(),
        StatusCode::TOO_MANY_REQUESTS => QuotaError::RateLimitExceeded {
            message,
            retry_after,
        }
        .into(),
        StatusCode::BAD_GATEWAY => ServerError::BadGateway(message).into(),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ServerError::ServiceUnavailable {
                message,
                retry_after,
            }
            .into()
        }
        _ if status.is_server_error() => ServerError::InternalError(message).into(),
        _ => RequestError::ValidationError(format!("HTTP {}: {}", status.as_u16(), message)).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockAuthProvider, MockResponse, MockTransport};
    use crate::transport::{HttpMethod, RequestBody};
    use bytes::Bytes;

    fn executor(transport: Arc<MockTransport>) -> RequestExecutor {
        let config = BrowserConfig::builder()
            .auth_provider(MockAuthProvider::new("test-token"))
            .build()
            .unwrap();
        RequestExecutor::new(config, transport)
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_build_url() {
        let executor = executor(Arc::new(MockTransport::new()));

        let url = executor.build_url::<()>("/files", None).unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/drive/v3/files");

        let url = executor
            .build_url("files/123", Some(&[("alt", "media")]))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/drive/v3/files/123?alt=media"
        );

        let url = executor
            .build_upload_url("files", Some(&[("uploadType", "multipart")]))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart"
        );
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("abc-123_x.y~"), "abc-123_x.y~");
        assert_eq!(encode_segment("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_adds_auth_and_content_type() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::ok_with_body(r#"{"id":"1"}"#));
        let executor = executor(transport.clone());

        let url = executor.build_url::<()>("files", None).unwrap();
        let mut request = HttpRequest::new(HttpMethod::Post, url);
        request.body = Some(RequestBody::Json(Bytes::from("{}")));
        let value: serde_json::Value = executor.execute_json(request).await.unwrap();
        assert_eq!(value["id"], "1");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.headers.get(AUTHORIZATION).unwrap(), "Bearer test-token");
        assert_eq!(
            sent.headers.get(CONTENT_TYPE).unwrap(),
            "application/json; charset=UTF-8"
        );
    }

    #[tokio::test]
    async fn test_error_status_is_mapped() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockResponse::error(404, "notFound", "File not found: x"));
        let executor = executor(transport);

        let url = executor.build_url::<()>("files/x", None).unwrap();
        let result = executor.execute(HttpRequest::new(HttpMethod::Get, url)).await;
        assert!(matches!(
            result,
            Err(BrowserError::Resource(ResourceError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_map_error_response() {
        let error = map_error_response(&response(401, "nope"));
        assert!(matches!(error, BrowserError::Authentication(_)));

        let body = r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"storageQuotaExceeded"}]}}"#;
        let error = map_error_response(&response(403, body));
        assert!(matches!(
            error,
            BrowserError::Quota(QuotaError::StorageQuotaExceeded(_))
        ));

        let body = r#"{"error":{"code":403,"message":"denied","errors":[{"reason":"insufficientFilePermissions"}]}}"#;
        let error = map_error_response(&response(403, body));
        assert!(matches!(
            error,
            BrowserError::Authorization(AuthorizationError::InsufficientPermissions(_))
        ));

        let error = map_error_response(&response(500, ""));
        assert!(matches!(error, BrowserError::Server(ServerError::InternalError(_))));

        let body = r#"{"error":{"code":400,"message":"bad q","errors":[{"reason":"invalidQuery"}]}}"#;
        let error = map_error_response(&response(400, body));
        assert!(matches!(error, BrowserError::Request(RequestError::InvalidQuery(_))));
    }

    #[test]
    fn test_retry_after_header() {
        let mut resp = response(429, "");
        resp.headers
            .insert("retry-after", HeaderValue::from_static("12"));
        let error = map_error_response(&resp);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(12)));
    }
}
