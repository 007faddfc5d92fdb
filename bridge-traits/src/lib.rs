//! # Host Bridge Traits
//!
//! Seams between the journal core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to a network library or a vendor SDK directly. Each
//! trait here represents a capability the core needs and that is implemented
//! by a separate crate:
//!
//! | Trait | Implementation Crate |
//! |-------|---------------------|
//! | [`HttpClient`](http::HttpClient) | `bridge-desktop` (reqwest) |
//! | [`DocumentStore`](storage::DocumentStore) | `provider-google-drive` |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should:
//!
//! - Convert vendor-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., file IDs, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared between the
//! request worker, the indexer and inbound request handlers.

pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{
    folder_url, DocumentStore, ListFilesParams, ListFilesResult, NewDocument, Permission,
    RemoteDocument, RemoteItem, TextReplacement,
};
