//! Drive API client.

use crate::config::BrowserConfig;
use crate::errors::{BrowserError, BrowserResult};
use crate::services::FilesService;
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;

mod executor;
pub use executor::{encode_segment, map_error_response, retry_after, RequestExecutor};

/// Drive API client.
///
/// Owns the request executor and hands out service objects that share it.
///
/// # Example
///
/// ```no_run
/// use integrations_drive_browser::{BrowserConfig, DriveClient, OAuth2Provider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let auth = OAuth2Provider::new_with_strings("client_id", "client_secret", "refresh_token");
/// let config = BrowserConfig::builder()
///     .auth_provider(auth)
///     .root_folder_id("1AbCdEf")
///     .build()?;
///
/// let client = DriveClient::new(config)?;
/// let files = client.files().list_all(Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DriveClient {
    executor: Arc<RequestExecutor>,
}

impl DriveClient {
    /// Creates a client that talks to Drive over reqwest.
    pub fn new(config: BrowserConfig) -> BrowserResult<Self> {
        config.validate()?;

        let transport = ReqwestTransport::from_config(&config).map_err(|e| {
            BrowserError::configuration(format!("Failed to create transport: {}", e))
        })?;

        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(config: BrowserConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            executor: Arc::new(RequestExecutor::new(config, transport)),
        }
    }

    /// Access the files service.
    pub fn files(&self) -> FilesService {
        FilesService::new(self.executor.clone())
    }

    /// Gets the configuration.
    pub fn config(&self) -> &BrowserConfig {
        self.executor.config()
    }

    /// Gets the request executor.
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockAuthProvider, MockTransport};

    #[test]
    fn test_client_exposes_config() {
        let config = BrowserConfig::builder()
            .auth_provider(MockAuthProvider::new("token"))
            .page_size(50)
            .build()
            .unwrap();
        let client = DriveClient::with_transport(config, Arc::new(MockTransport::new()));
        assert_eq!(client.config().page_size, 50);
        assert_eq!(
            client.executor().config().base_url.as_str(),
            "https://www.googleapis.com/drive/v3/"
        );
    }
}
