//! Drive API service implementations.

mod files;
pub mod upload;

pub use files::*;
pub use upload::{ResumableUploadSession, UploadService};
