//! # Journal Config Info Cache
//!
//! The journal folder, the journal template and the extra journal folders
//! rarely change, so they are fetched once and memoized until explicitly
//! invalidated.

use bridge_traits::storage::{DocumentStore, RemoteDocument, RemoteItem};
use core_runtime::config::DriveSettings;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{JournalError, Result};
use crate::template::validate_template;

/// Resolved journal configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigInfo {
    pub journal_folder: RemoteItem,
    pub template: RemoteDocument,
    /// Extra folders that could be fetched, in configured order
    pub extra_folders: Vec<RemoteItem>,
}

/// Lazily fetched, shared [`ConfigInfo`]
///
/// Concurrent first callers are serialized on an async mutex, so only one of
/// them talks to the remote service.
pub struct ConfigInfoCache {
    journal_folder_id: String,
    template_file_id: String,
    extra_folder_ids: Vec<String>,
    cached: Mutex<Option<Arc<ConfigInfo>>>,
}

impl ConfigInfoCache {
    pub fn new(settings: &DriveSettings) -> Self {
        Self {
            journal_folder_id: settings.journal_folder.clone(),
            template_file_id: settings.template_file.clone(),
            extra_folder_ids: settings.extra_journal_folders.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Return the cached value, fetching it first if necessary.
    ///
    /// # Errors
    ///
    /// - [`JournalError::ConfigFetch`] if the journal folder or template
    ///   cannot be fetched
    /// - [`JournalError::InvalidTemplate`] if the template lacks placeholders
    ///
    /// Nothing is cached on error; the next call tries again.
    pub async fn get_or_fetch(&self, store: &dyn DocumentStore) -> Result<Arc<ConfigInfo>> {
        let mut cached = self.cached.lock().await;
        if let Some(info) = cached.as_ref() {
            return Ok(Arc::clone(info));
        }

        let journal_folder = store
            .get_file(&self.journal_folder_id)
            .await
            .map_err(|source| JournalError::ConfigFetch {
                what: format!("journal folder {}", self.journal_folder_id),
                source,
            })?;

        let template = store
            .read_document(&self.template_file_id)
            .await
            .map_err(|source| JournalError::ConfigFetch {
                what: format!("journal template {}", self.template_file_id),
                source,
            })?;

        validate_template(&template.content)?;

        let mut extra_folders = Vec::with_capacity(self.extra_folder_ids.len());
        for id in &self.extra_folder_ids {
            match store.get_file(id).await {
                Ok(folder) => extra_folders.push(folder),
                Err(e) => warn!(folder_id = %id, error = %e, "Failed to fetch extra journal folder"),
            }
        }

        info!(
            journal_folder = %journal_folder.name,
            template = %template.item.name,
            extra_folders = extra_folders.len(),
            "Fetched journal config info"
        );

        let info = Arc::new(ConfigInfo {
            journal_folder,
            template,
            extra_folders,
        });
        *cached = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Peek at the cached value without fetching
    pub async fn cached(&self) -> Option<Arc<ConfigInfo>> {
        self.cached.lock().await.clone()
    }

    /// Drop the cached value; the next `get_or_fetch` fetches again.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
