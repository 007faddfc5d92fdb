//! # Journal Core
//!
//! Remote journal access and search indexing for the rehab service.
//!
//! ## Overview
//!
//! - Serializing every remote document call through a single queue
//! - Creating journals from a template document
//! - Memoizing the journal configuration (folders, template)
//! - Periodically mirroring journal folders into a local search index
//!
//! ## Components
//!
//! - **Worker** (`worker`): Bounded request queue drained by the drive worker
//! - **Tasks** (`task`): Typed requests, responses and per-call options
//! - **Config Cache** (`config_cache`): Lazily fetched journal configuration
//! - **Template** (`template`): Placeholder substitution for new journals
//! - **Search** (`search`): Search index entries and their extra data
//! - **Repository** (`repository`): SQLite persistence for the search index
//! - **Indexer** (`indexer`): Periodic folder sweep keeping the index current

pub mod config_cache;
pub mod error;
pub mod indexer;
pub mod repository;
pub mod search;
pub mod task;
pub mod template;
pub mod worker;

pub use config_cache::{ConfigInfo, ConfigInfoCache};
pub use error::{JournalError, Result};
pub use indexer::{FileOutcome, IndexerSettings, SearchIndexer, SweepReport};
pub use repository::{SearchIndexRepository, SqliteSearchIndexRepository};
pub use search::{patient_url, ExtraData, Namespace, SearchEntry};
pub use task::{CallOptions, TaskKind, TaskRequest, TaskResponse};
pub use template::{validate_template, TemplateVar, TemplateVars};
pub use worker::DriveWorker;
