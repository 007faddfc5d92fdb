//! # Google Drive Provider
//!
//! Implements `DocumentStore` for Google Drive API v3 and Google Docs API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - File and folder lookup including sharing permissions
//! - Paginated listing of Google Docs in a folder, newest first
//! - Markdown export of journal documents
//! - Journal creation by copying a template and replacing placeholders
//! - User invitations (permission grants)
//! - Shared drive support (`supportsAllDrives`)

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::GoogleDriveError;
