//! Browser configuration.
//!
//! [`BrowserConfig`] carries everything the gateway and navigator need:
//! endpoints and timeouts for the HTTP layer, paging and upload sizing for the
//! files service, and the browsing policy (root folder, permissions, download
//! directory) for the navigator. Build one with [`BrowserConfig::builder`];
//! the builder validates on `build()`.

use crate::auth::AuthProvider;
use crate::errors::{BrowserError, BrowserResult, ConfigurationError};
use crate::model::{FolderRef, Permissions};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/";

/// Title shown for the root when only its id is configured.
pub const DEFAULT_ROOT_NAME: &str = "Drive Folder";

/// Resumable upload chunks must be a multiple of this many bytes.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

/// Upper bound Drive accepts for `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Resolved, validated settings.
#[derive(Clone)]
pub struct BrowserConfig {
    /// Supplies bearer tokens.
    pub auth_provider: Arc<dyn AuthProvider>,
    /// Files API root; always ends in `/`.
    pub base_url: Url,
    /// Upload API root; always ends in `/`.
    pub upload_url: Url,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Sent as `User-Agent`.
    pub user_agent: String,
    /// `pageSize` for folder listings.
    pub page_size: u32,
    /// Bytes per resumable upload request.
    pub upload_chunk_size: usize,
    /// Files at or under this size go up in one multipart request.
    pub simple_upload_limit: u64,
    /// Top of the navigable tree.
    pub root_folder: Option<FolderRef>,
    /// Downloads land here, mirroring the breadcrumb below the root.
    pub download_dir: PathBuf,
    /// Which row actions are offered.
    pub permissions: Permissions,
    /// Offer "copy path" on file rows.
    pub copyable_paths: bool,
    /// Put the breadcrumb path in the header subtitle.
    pub show_navigation_path: bool,
}

impl fmt::Debug for BrowserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserConfig")
            .field("base_url", &self.base_url.as_str())
            .field("upload_url", &self.upload_url.as_str())
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("root_folder", &self.root_folder)
            .field("download_dir", &self.download_dir)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl BrowserConfig {
    /// Starts a builder with default settings.
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::new()
    }

    /// Checks sizes, schemes and the root id.
    pub fn validate(&self) -> BrowserResult<()> {
        let problem = if self.upload_chunk_size == 0
            || self.upload_chunk_size % UPLOAD_CHUNK_GRANULARITY != 0
        {
            Some(format!(
                "upload chunk size {} is not a multiple of {} bytes",
                self.upload_chunk_size, UPLOAD_CHUNK_GRANULARITY
            ))
        } else if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            Some(format!(
                "page size {} is outside 1..={}",
                self.page_size, MAX_PAGE_SIZE
            ))
        } else if let Some(url) = [&self.base_url, &self.upload_url]
            .into_iter()
            .find(|url| url.scheme() != "https")
        {
            Some(format!("{} is not an https endpoint", url))
        } else if self
            .root_folder
            .as_ref()
            .is_some_and(|root| root.id.trim().is_empty())
        {
            Some("root folder id is blank".to_string())
        } else {
            None
        };

        match problem {
            Some(message) => Err(BrowserError::configuration(message)),
            None => Ok(()),
        }
    }
}

/// Fluent construction of a [`BrowserConfig`].
pub struct BrowserConfigBuilder {
    auth_provider: Option<Arc<dyn AuthProvider>>,
    base_url: String,
    upload_url: String,
    user_agent: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    page_size: u32,
    upload_chunk_size: usize,
    simple_upload_limit: u64,
    root_folder: Option<FolderRef>,
    download_dir: PathBuf,
    permissions: Permissions,
    copyable_paths: bool,
    show_navigation_path: bool,
}

impl Default for BrowserConfigBuilder {
    fn default() -> Self {
        Self {
            auth_provider: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            user_agent: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            page_size: 100,
            upload_chunk_size: 32 * UPLOAD_CHUNK_GRANULARITY,
            simple_upload_limit: 5 * 1024 * 1024,
            root_folder: None,
            download_dir: PathBuf::from("downloads"),
            permissions: Permissions::default(),
            copyable_paths: false,
            show_navigation_path: false,
        }
    }
}

impl BrowserConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_provider<A: AuthProvider + 'static>(self, provider: A) -> Self {
        self.auth_provider_arc(Arc::new(provider))
    }

    pub fn auth_provider_arc(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Entries per listing request, 1 to 1000.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Must be a multiple of 256 KiB.
    pub fn upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = size;
        self
    }

    pub fn simple_upload_limit(mut self, bytes: u64) -> Self {
        self.simple_upload_limit = bytes;
        self
    }

    /// Root by id alone; the header shows [`DEFAULT_ROOT_NAME`].
    pub fn root_folder_id(self, id: impl Into<String>) -> Self {
        self.root_folder(id, DEFAULT_ROOT_NAME)
    }

    pub fn root_folder(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.root_folder = Some(FolderRef::new(id, name));
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn copyable_paths(mut self, enabled: bool) -> Self {
        self.copyable_paths = enabled;
        self
    }

    pub fn show_navigation_path(mut self, enabled: bool) -> Self {
        self.show_navigation_path = enabled;
        self
    }

    /// Resolves endpoints and validates. Fails without an auth provider.
    pub fn build(self) -> BrowserResult<BrowserConfig> {
        let auth_provider = self.auth_provider.ok_or_else(|| {
            ConfigurationError::MissingCredentials("no auth provider configured".to_string())
        })?;

        let config = BrowserConfig {
            auth_provider,
            base_url: endpoint(&self.base_url)?,
            upload_url: endpoint(&self.upload_url)?,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            user_agent: self.user_agent.unwrap_or_else(|| {
                concat!("integrations-drive-browser/", env!("CARGO_PKG_VERSION")).to_string()
            }),
            page_size: self.page_size,
            upload_chunk_size: self.upload_chunk_size,
            simple_upload_limit: self.simple_upload_limit,
            root_folder: self.root_folder,
            download_dir: self.download_dir,
            permissions: self.permissions,
            copyable_paths: self.copyable_paths,
            show_navigation_path: self.show_navigation_path,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses an API root with a trailing slash so `Url::join` appends to it.
fn endpoint(raw: &str) -> BrowserResult<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash)
        .map_err(|e| BrowserError::configuration(format!("bad endpoint '{}': {}", raw, e)))
}
