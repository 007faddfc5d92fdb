//! # Folder Indexer
//!
//! Periodically mirrors the journal folders into the local search index.
//!
//! ## Overview
//!
//! Every sweep lists the documents of the journal folder and each extra
//! folder (through the [`DriveWorker`], so the indexer never competes with
//! interactive requests) and reconciles each document with its index entry:
//!
//! - trashed documents are removed from the index
//! - documents not modified since they were indexed only get their metadata
//!   (folder, header, created time) refreshed
//! - other documents are read and (re)indexed; if reading fails a "skipped"
//!   entry is written so the document is not fetched again until it changes
//!
//! A journal referenced by a patient is indexed under that patient's page,
//! otherwise under the document itself.

use bridge_traits::storage::{ListFilesParams, ListFilesResult, RemoteItem};
use chrono::{DateTime, NaiveDate, Utc};
use core_runtime::config::{DriveSettings, IndexerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{JournalError, Result};
use crate::repository::SearchIndexRepository;
use crate::search::{
    patient_url, ExtraData, Namespace, SearchEntry, SearchJournalInfo, SearchPatientInfo,
};
use crate::task::CallOptions;
use crate::worker::DriveWorker;

/// What the indexer monitors and how often
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSettings {
    pub journal_folder: String,
    pub extra_folders: Vec<String>,
    pub interval: Duration,
    /// Language tag stored with each entry (full-text search configuration)
    pub language: String,
}

impl IndexerSettings {
    pub fn from_config(drive: &DriveSettings, indexer: &IndexerConfig) -> Self {
        Self {
            journal_folder: drive.journal_folder.clone(),
            extra_folders: drive.extra_journal_folders.clone(),
            interval: indexer.interval(),
            language: indexer.language.clone(),
        }
    }
}

/// Result of indexing a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Created,
    Updated,
    MetadataRefreshed,
    Deleted,
    /// Trashed document without an entry
    Unchanged,
}

/// Counters for one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub folders_indexed: usize,
    pub folders_failed: usize,
    pub created: usize,
    pub updated: usize,
    pub metadata_refreshed: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub files_failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Created => self.created += 1,
            FileOutcome::Updated => self.updated += 1,
            FileOutcome::MetadataRefreshed => self.metadata_refreshed += 1,
            FileOutcome::Deleted => self.deleted += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
        }
    }

    fn merge(&mut self, other: &SweepReport) {
        self.folders_indexed += other.folders_indexed;
        self.folders_failed += other.folders_failed;
        self.created += other.created;
        self.updated += other.updated;
        self.metadata_refreshed += other.metadata_refreshed;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.files_failed += other.files_failed;
    }

    /// Entries written with content during the sweep
    pub fn upserted(&self) -> usize {
        self.created + self.updated
    }
}

/// Where a document is indexed and what is stored with it
struct IndexTarget {
    namespace: Namespace,
    associated_url: String,
    extra_data: ExtraData,
    /// Modification time recorded in the index, if an entry exists
    indexed_updated: Option<DateTime<Utc>>,
    created: Option<DateTime<Utc>>,
}

pub struct SearchIndexer {
    worker: Arc<DriveWorker>,
    repository: Arc<dyn SearchIndexRepository>,
    settings: IndexerSettings,
    call_options: CallOptions,
}

impl SearchIndexer {
    pub fn new(
        worker: Arc<DriveWorker>,
        repository: Arc<dyn SearchIndexRepository>,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            worker,
            repository,
            settings,
            call_options: CallOptions::default(),
        }
    }

    /// Run a sweep now and then every interval until `shutdown` fires.
    pub fn spawn(mut self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.call_options = self.call_options.with_cancel(shutdown.clone());

        tokio::spawn(async move {
            info!(
                interval_secs = self.settings.interval.as_secs(),
                folders = 1 + self.settings.extra_folders.len(),
                "Search indexer started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.sweep() => {}
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.interval) => {}
                }
            }

            info!("Search indexer stopped");
        })
    }

    /// Index every monitored folder once.
    ///
    /// Folder and file failures are logged and counted; they never abort the
    /// sweep.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let folders = std::iter::once(&self.settings.journal_folder)
            .chain(self.settings.extra_folders.iter());

        for folder_id in folders {
            match self.index_folder(folder_id).await {
                Ok(folder_report) => report.merge(&folder_report),
                Err(e) => {
                    error!(folder_id = %folder_id, error = %e, "Failed to index folder");
                    report.folders_failed += 1;
                }
            }
        }

        info!(
            folders = report.folders_indexed,
            failed_folders = report.folders_failed,
            upserted = report.upserted(),
            deleted = report.deleted,
            failed_files = report.files_failed,
            "Search index sweep finished"
        );

        report
    }

    /// List every page of a folder
    async fn list_all_files(&self, folder_id: &str) -> Result<ListFilesResult> {
        let mut result = self
            .worker
            .list_files(ListFilesParams::new(folder_id), &self.call_options)
            .await?;

        while let Some(token) = result.next_page_token.take() {
            let page = self
                .worker
                .list_files(
                    ListFilesParams::new(folder_id).with_page_token(token),
                    &self.call_options,
                )
                .await?;
            result.files.extend(page.files);
            result.next_page_token = page.next_page_token;
        }

        Ok(result)
    }

    /// Index all documents of one folder.
    ///
    /// Fails only if the folder cannot be listed.
    #[instrument(skip(self))]
    pub async fn index_folder(&self, folder_id: &str) -> Result<SweepReport> {
        let listing = self.list_all_files(folder_id).await?;
        let folder = &listing.folder;

        info!(
            folder = %folder.name,
            files = listing.files.len(),
            "START: indexing folder"
        );

        let mut report = SweepReport {
            folders_indexed: 1,
            ..SweepReport::default()
        };

        for file in &listing.files {
            match self.index_file(folder, file).await {
                Ok(outcome) => {
                    debug!(file = %file.name, ?outcome, "Indexed file");
                    report.record(outcome);
                }
                Err(e) => {
                    error!(file = %file.name, error = %e, "Failed to index file");
                    report.files_failed += 1;
                }
            }
        }

        info!(folder = %folder.name, "DONE: indexing folder");
        Ok(report)
    }

    /// Reconcile a single document with its index entry.
    pub async fn index_file(&self, folder: &RemoteItem, file: &RemoteItem) -> Result<FileOutcome> {
        let target = self.resolve_target(folder, file).await?;

        if file.trashed {
            if target.indexed_updated.is_none() {
                return Ok(FileOutcome::Unchanged);
            }
            self.repository
                .delete_entry(target.namespace, &target.associated_url)
                .await?;
            return Ok(FileOutcome::Deleted);
        }

        let extra_json = match target.extra_data.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(file = %file.name, error = %e, "Failed to serialize extra data");
                None
            }
        };

        if let Some(indexed) = target.indexed_updated {
            let newer = file.modified_time.is_some_and(|modified| modified > indexed);
            if !newer {
                self.refresh_metadata(&target, file, extra_json.as_deref()).await;
                return Ok(FileOutcome::MetadataRefreshed);
            }
        }

        let extra_text = target.extra_data.indexable_text();
        let mut entry = SearchEntry {
            namespace: target.namespace,
            associated_url: target.associated_url.clone(),
            header: file.name.clone(),
            body: String::new(),
            extra_data: extra_json,
            created: target.created,
            updated: file.modified_time,
            language: self.settings.language.clone(),
            skipped: false,
        };

        match self.worker.read_document(&file.id, &self.call_options).await {
            Ok(document) => {
                entry.body = document.content + &extra_text;
                self.repository.upsert_entry(&entry).await?;
                Ok(if target.indexed_updated.is_some() {
                    FileOutcome::Updated
                } else {
                    FileOutcome::Created
                })
            }
            Err(source) => {
                entry.body = extra_text;
                entry.skipped = true;
                self.repository.upsert_skipped_entry(&entry).await?;
                Err(JournalError::Skipped {
                    file: file.name.clone(),
                    source: Box::new(source),
                })
            }
        }
    }

    async fn refresh_metadata(
        &self,
        target: &IndexTarget,
        file: &RemoteItem,
        extra_json: Option<&str>,
    ) {
        let Some(extra_json) = extra_json else {
            return;
        };

        match self
            .repository
            .update_metadata(
                target.namespace,
                &target.associated_url,
                extra_json,
                target.created,
                &file.name,
            )
            .await
        {
            Ok(0) => warn!(file = %file.name, "Metadata refresh matched no entry"),
            Ok(_) => {}
            Err(e) => warn!(file = %file.name, error = %e, "Failed to refresh metadata"),
        }
    }

    async fn resolve_target(&self, folder: &RemoteItem, file: &RemoteItem) -> Result<IndexTarget> {
        let journal_info = SearchJournalInfo {
            folder_url: folder.folder_url(),
            folder_name: folder.name.clone(),
        };

        let patients = self.repository.patients_referencing(&file.id).await?;
        if patients.len() > 1 {
            warn!(
                file = %file.name,
                patients = ?patients,
                "Journal referenced by several patients, using the newest"
            );
        }

        let (namespace, associated_url, extra_data) = match patients.first() {
            Some(&patient_id) => (
                Namespace::Patient,
                patient_url(patient_id),
                ExtraData::Patient(SearchPatientInfo {
                    journal_info,
                    journal_url: file.document_url(),
                }),
            ),
            None => (
                Namespace::Journal,
                file.document_url(),
                ExtraData::Journal(journal_info),
            ),
        };

        let indexed_updated = match self
            .repository
            .updated_time(namespace, &associated_url)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!(file = %file.name, error = %e, "Failed to look up indexed time");
                None
            }
        };

        Ok(IndexTarget {
            namespace,
            associated_url,
            extra_data,
            indexed_updated,
            created: created_time(file),
        })
    }
}

/// Creation time of a journal; a leading `YYYY-MM-DD` in the name wins.
pub fn created_time(file: &RemoteItem) -> Option<DateTime<Utc>> {
    file.name
        .split_whitespace()
        .next()
        .and_then(parse_date_prefix)
        .or(file.created_time)
}

fn parse_date_prefix(token: &str) -> Option<DateTime<Utc>> {
    if token.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
