//! Errors raised while browsing, grouped by where they come from.
//!
//! Remote failures are produced by the request executor from Drive's error
//! envelope. Local failures come from the filesystem during uploads and
//! downloads. Navigation and permission failures never reach the network.

use std::time::Duration;
use thiserror::Error;

/// Shorthand used across the crate.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// What a failed listing tells the host about how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote store or the path to it failed.
    Transport,
    /// Credentials were rejected or lack access.
    Auth,
    /// Setup is wrong; retrying will not help.
    Configuration,
    /// The call itself was invalid.
    Request,
    /// The remote entry does not exist.
    Resource,
    /// Reading or writing a local file failed.
    Local,
}

/// Every failure surfaced by the browser.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("authentication: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("not authorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("bad request: {0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Resource(#[from] ResourceError),

    #[error("quota: {0}")]
    Quota(#[from] QuotaError),

    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("drive: {0}")]
    Server(#[from] ServerError),

    #[error("unreadable response: {0}")]
    Response(#[from] ResponseError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("{0}")]
    Navigation(#[from] NavigationError),
}

impl BrowserError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ConfigurationError::InvalidConfiguration(msg.into()).into()
    }

    pub fn request(msg: impl Into<String>) -> Self {
        RequestError::ValidationError(msg.into()).into()
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        RequestError::MissingParameter(name.into()).into()
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ResourceError::FileNotFound(msg.into()).into()
    }

    pub fn network(msg: impl Into<String>) -> Self {
        NetworkError::ConnectionFailed(msg.into()).into()
    }

    pub fn server(msg: impl Into<String>) -> Self {
        ServerError::InternalError(msg.into()).into()
    }

    pub fn deserialization(msg: impl Into<String>) -> Self {
        ResponseError::DeserializationError(msg.into()).into()
    }

    /// Coarse classification published with failed listings.
    pub fn kind(&self) -> ErrorKind {
        use BrowserError::*;

        match self {
            Configuration(_) => ErrorKind::Configuration,
            Authentication(_) | Authorization(_) => ErrorKind::Auth,
            Request(_) | Navigation(_) => ErrorKind::Request,
            Resource(_) => ErrorKind::Resource,
            Upload(UploadError::Io(_) | UploadError::UnsupportedMimeType(_)) | Download(_) => {
                ErrorKind::Local
            }
            Quota(_) | Network(_) | Server(_) | Response(_) | Upload(_) => ErrorKind::Transport,
        }
    }

    /// Setup errors; the browser cannot do anything until they are fixed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::Configuration(_))
    }

    /// Server-supplied backoff, from `Retry-After`.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BrowserError::Quota(QuotaError::RateLimitExceeded { retry_after, .. })
            | BrowserError::Server(ServerError::ServiceUnavailable { retry_after, .. }) => {
                *retry_after
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    InvalidConfiguration(String),

    #[error("no root folder id was provided")]
    MissingRootFolder,
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Drive answered 401.
    #[error("token rejected: {0}")]
    InvalidToken(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Signing the service-account assertion failed.
    #[error("could not sign assertion: {0}")]
    JwtEncodingError(String),
}

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("{0}")]
    Forbidden(String),

    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("blocked by domain policy: {0}")]
    DomainPolicy(String),

    /// Refused locally by [`Permissions`](crate::model::Permissions); nothing
    /// was sent.
    #[error("{0} is not allowed with the current permissions")]
    ActionNotPermitted(String),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    ValidationError(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("not found: {0}")]
    FileNotFound(String),
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("storage full: {0}")]
    StorageQuotaExceeded(String),

    #[error("rate limited: {message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("{0}")]
    ConnectionFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InternalError(String),

    #[error("unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("bad gateway: {0}")]
    BadGateway(String),
}

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("{0}")]
    DeserializationError(String),

    #[error("{0}")]
    UnexpectedFormat(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// No content type could be guessed from the file name.
    #[error("unknown content type for {0}")]
    UnsupportedMimeType(String),

    #[error("{0}")]
    Io(String),

    /// The resumable session URI was not returned.
    #[error("no upload session: {0}")]
    SessionNotStarted(String),

    #[error("interrupted: {0}")]
    UploadInterrupted(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Folders have no content to download.
    #[error("{0} is not a file")]
    NotAFile(String),

    #[error("writing {path}: {message}")]
    Io { path: String, message: String },
}

/// Misuse of the navigator's call order.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("the root folder cannot change once navigation has started")]
    RootLocked,

    #[error("the navigator has not been initialized")]
    NotInitialized,
}

/// Failures below HTTP status handling, from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Network(message)
        } else {
            TransportError::Http(message)
        }
    }
}

impl From<TransportError> for BrowserError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => NetworkError::Timeout(msg).into(),
            TransportError::Network(msg) => NetworkError::ConnectionFailed(msg).into(),
            TransportError::Http(msg) => ResponseError::UnexpectedFormat(msg).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        let cases: Vec<(BrowserError, ErrorKind)> = vec![
            (NetworkError::Timeout("slow".into()).into(), ErrorKind::Transport),
            (AuthenticationError::InvalidToken("bad".into()).into(), ErrorKind::Auth),
            (AuthorizationError::ActionNotPermitted("delete".into()).into(), ErrorKind::Auth),
            (ConfigurationError::MissingRootFolder.into(), ErrorKind::Configuration),
            (NavigationError::NotInitialized.into(), ErrorKind::Request),
            (BrowserError::not_found("x"), ErrorKind::Resource),
            (UploadError::UnsupportedMimeType("x".into()).into(), ErrorKind::Local),
            (UploadError::UploadInterrupted("x".into()).into(), ErrorKind::Transport),
            (DownloadError::NotAFile("x".into()).into(), ErrorKind::Local),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{}", error);
        }
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(BrowserError::configuration("no auth").is_fatal());
        assert!(!BrowserError::network("offline").is_fatal());
        assert!(!BrowserError::from(NavigationError::RootLocked).is_fatal());
    }

    #[test]
    fn test_transport_conversion() {
        let error: BrowserError = TransportError::Timeout("30s".to_string()).into();
        assert!(matches!(error, BrowserError::Network(NetworkError::Timeout(_))));

        let error: BrowserError = TransportError::Http("garbled".to_string()).into();
        assert!(matches!(
            error,
            BrowserError::Response(ResponseError::UnexpectedFormat(_))
        ));
    }

    #[test]
    fn test_retry_after() {
        let error = BrowserError::Quota(QuotaError::RateLimitExceeded {
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(BrowserError::server("boom").retry_after(), None);
    }

    #[test]
    fn test_permission_message_names_action() {
        let error = BrowserError::from(AuthorizationError::ActionNotPermitted("delete".into()));
        assert_eq!(
            error.to_string(),
            "not authorized: delete is not allowed with the current permissions"
        );
    }
}
