//! Google Drive Folder Browser
//!
//! The core of a file browser rooted at a single Google Drive folder: a
//! navigation state machine over an immutable breadcrumb, listing order and
//! display formatting, and the Drive v3 calls behind it (listing with
//! pagination, search, folder creation, delete, multipart and resumable
//! upload, streamed download). OAuth 2.0 refresh tokens and service-account
//! keys are both supported.
//!
//! # Features
//!
//! - **Navigation**: Enter folders, go back, search, refresh; stale results are discarded
//! - **Listing**: Folders first, then by name; sizes, dates and icons for display
//! - **File Operations**: Create folder, delete, upload, download, share link, copy path
//! - **Permissions**: Strict, user and admin levels gate what the browser offers
//! - **Authentication**: OAuth 2.0 and Service Account support
//!
//! # Example
//!
//! ```no_run
//! use integrations_drive_browser::{BrowserConfig, DriveGateway, Navigator, OAuth2Provider};
//! use integrations_drive_browser::presentation::render;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = OAuth2Provider::new_with_strings("client_id", "client_secret", "refresh_token");
//!
//! let config = BrowserConfig::builder()
//!     .auth_provider(auth)
//!     .root_folder("1AbCdEf", "Shared Reports")
//!     .build()?;
//!
//! let gateway = DriveGateway::from_config(config.clone())?;
//! let mut navigator = Navigator::from_config(gateway, &config);
//!
//! navigator.initialize()?;
//! navigator.process_next().await;
//! for row in render(&navigator.listing(), &navigator.row_policy()) {
//!     println!("{:?}", row);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod auth;
pub mod client;
#[allow(missing_docs)]
pub mod config;
#[allow(missing_docs)]
pub mod errors;
pub mod format;
pub mod gateway;
pub mod model;
pub mod navigation;
pub mod pagination;
pub mod presentation;
pub mod services;
pub mod transport;
#[allow(missing_docs)]
pub mod types;

// Test doubles, used by unit tests and the integration suites
pub mod mocks;

// Re-exports for convenience
pub use auth::{AccessToken, AuthProvider, OAuth2Provider, ServiceAccountProvider};
pub use client::DriveClient;
pub use config::{BrowserConfig, BrowserConfigBuilder};
pub use errors::{BrowserError, BrowserResult, ErrorKind};
pub use gateway::{DriveGateway, RemoteDirectoryGateway, UploadSource};
pub use model::{Action, FolderRef, ItemKind, Permissions, RemoteEntry};
pub use navigation::{
    BrowserEvent, Breadcrumb, ListingState, NavigationState, Navigator, NavigatorOptions,
};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_drive_browser::prelude::*;
/// ```
pub mod prelude {
    // Navigation
    pub use crate::navigation::{
        BackOutcome, Breadcrumb, BrowserEvent, FetchTicket, ListingState, NavigationState,
        Navigator, NavigatorOptions, Operation, Processed,
    };

    // Configuration
    pub use crate::config::{BrowserConfig, BrowserConfigBuilder};

    // Authentication
    pub use crate::auth::{AccessToken, AuthProvider, OAuth2Provider, ServiceAccountProvider};

    // Remote access
    pub use crate::client::DriveClient;
    pub use crate::gateway::{DriveGateway, RemoteDirectoryGateway, UploadSource};

    // Model and display
    pub use crate::format::{format_date, format_size, order_for_display};
    pub use crate::model::{Action, FileEntry, FolderEntry, FolderRef, ItemKind, Permissions, RemoteEntry};
    pub use crate::presentation::{header, icon_for, render, Header, Icon, Row, RowPolicy};

    // Errors
    pub use crate::errors::{BrowserError, BrowserResult, ErrorKind};
}
