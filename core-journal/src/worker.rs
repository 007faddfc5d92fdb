//! # Drive Request Worker
//!
//! Serializes every call to the remote document service through a bounded
//! queue drained by a fixed number of workers (one by default).
//!
//! ## Overview
//!
//! Callers submit a [`TaskRequest`] and wait for exactly one reply on a
//! private channel. With a single worker, requests start in submission order
//! and at most one remote call is in flight at any time. A full queue makes
//! callers wait (backpressure) instead of failing.
//!
//! ## Usage
//!
//! ```ignore
//! use core_journal::{CallOptions, DriveWorker};
//!
//! let worker = DriveWorker::start(config, store, cache, shutdown.clone());
//! let folder = worker.get_file("folder-id", &CallOptions::default()).await?;
//! ```

use bridge_traits::storage::{
    DocumentStore, ListFilesParams, ListFilesResult, NewDocument, RemoteDocument, RemoteItem,
};
use core_runtime::config::WorkerConfig;
use core_runtime::logging::redact_if_sensitive;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config_cache::{ConfigInfo, ConfigInfoCache};
use crate::error::{JournalError, Result};
use crate::task::{CallOptions, TaskEnvelope, TaskKind, TaskRequest, TaskResponse};
use crate::template::TemplateVars;

/// Handle to the running request workers
pub struct DriveWorker {
    sender: mpsc::Sender<TaskEnvelope>,
    handler: Arc<TaskHandler>,
    default_timeout: Option<Duration>,
    shutdown: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Executes requests against the remote store
struct TaskHandler {
    store: Arc<dyn DocumentStore>,
    cache: Arc<ConfigInfoCache>,
}

impl DriveWorker {
    /// Create the request queue and spawn the worker loops.
    ///
    /// Must be called from within a Tokio runtime. The loops stop when
    /// `shutdown` is cancelled or every handle to the worker is dropped.
    pub fn start(
        config: &WorkerConfig,
        store: Arc<dyn DocumentStore>,
        cache: Arc<ConfigInfoCache>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let capacity = config.queue_capacity.max(1);
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(TaskHandler { store, cache });

        if workers > 1 {
            warn!(
                workers,
                "Running more than one drive worker; requests may start out of order"
            );
        }

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&handler),
                    shutdown.clone(),
                ))
            })
            .collect();

        info!(capacity, workers, "Drive worker started");

        Arc::new(Self {
            sender,
            handler,
            default_timeout: config.request_timeout(),
            shutdown,
            handles: std::sync::Mutex::new(handles),
        })
    }

    /// Submit a request and wait for its reply.
    pub(crate) async fn exec(
        &self,
        request: TaskRequest,
        opts: &CallOptions,
    ) -> Result<TaskResponse> {
        if self.shutdown.is_cancelled() {
            return Err(JournalError::WorkerStopped);
        }

        let (reply, response) = oneshot::channel();
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            request,
            reply,
        };

        let roundtrip = async {
            self.sender
                .send(envelope)
                .await
                .map_err(|_| JournalError::WorkerStopped)?;
            response.await.map_err(|_| JournalError::WorkerStopped)?
        };

        let bounded = async {
            match opts.timeout.or(self.default_timeout) {
                Some(limit) => tokio::time::timeout(limit, roundtrip)
                    .await
                    .unwrap_or(Err(JournalError::Timeout(limit))),
                None => roundtrip.await,
            }
        };

        match &opts.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(JournalError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }

    pub async fn get_file(&self, id: impl Into<String>, opts: &CallOptions) -> Result<RemoteItem> {
        match self.exec(TaskRequest::GetFile { id: id.into() }, opts).await? {
            TaskResponse::File(item) => Ok(item),
            other => Err(unexpected(TaskKind::GetFile, &other)),
        }
    }

    /// Share a file or folder with a user, who is notified by e-mail.
    pub async fn invite_user(
        &self,
        id: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
        opts: &CallOptions,
    ) -> Result<()> {
        let request = TaskRequest::InviteUser {
            id: id.into(),
            email: email.into(),
            role: role.into(),
        };
        match self.exec(request, opts).await? {
            TaskResponse::Invited => Ok(()),
            other => Err(unexpected(TaskKind::InviteUser, &other)),
        }
    }

    /// Copy the journal template into the journal folder.
    pub async fn create_journal(
        &self,
        vars: TemplateVars,
        opts: &CallOptions,
    ) -> Result<RemoteItem> {
        match self.exec(TaskRequest::CreateJournal(vars), opts).await? {
            TaskResponse::JournalCreated(item) => Ok(item),
            other => Err(unexpected(TaskKind::CreateJournal, &other)),
        }
    }

    /// List one page of documents in a folder.
    pub async fn list_files(
        &self,
        params: ListFilesParams,
        opts: &CallOptions,
    ) -> Result<ListFilesResult> {
        match self.exec(TaskRequest::ListFiles(params), opts).await? {
            TaskResponse::Files(result) => Ok(result),
            other => Err(unexpected(TaskKind::ListFiles, &other)),
        }
    }

    pub async fn read_document(
        &self,
        id: impl Into<String>,
        opts: &CallOptions,
    ) -> Result<RemoteDocument> {
        match self.exec(TaskRequest::ReadDocument { id: id.into() }, opts).await? {
            TaskResponse::Document(document) => Ok(document),
            other => Err(unexpected(TaskKind::ReadDocument, &other)),
        }
    }

    /// Cached journal configuration, fetched on first use.
    ///
    /// A cache miss is fetched by the worker like any other request, so it
    /// waits behind calls already queued.
    pub async fn config_info(&self, opts: &CallOptions) -> Result<Arc<ConfigInfo>> {
        match self.exec(TaskRequest::ConfigInfo, opts).await? {
            TaskResponse::ConfigInfo(info) => Ok(info),
            other => Err(unexpected(TaskKind::ConfigInfo, &other)),
        }
    }

    pub async fn invalidate_config_info(&self) {
        self.handler.cache.invalidate().await;
    }

    /// Stop the worker loops and wait for them to finish.
    ///
    /// A request being handled when this is called completes first; queued
    /// requests are dropped and their callers get [`JournalError::WorkerStopped`].
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Drive worker task ended abnormally");
            }
        }
    }
}

fn unexpected(expected: TaskKind, actual: &TaskResponse) -> JournalError {
    JournalError::UnexpectedResponse {
        expected,
        actual: actual.kind(),
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskEnvelope>>>,
    handler: Arc<TaskHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                envelope = receiver.recv() => envelope,
            }
        };

        let Some(envelope) = next else {
            break;
        };

        let kind = envelope.request.kind();

        if envelope.reply.is_closed() {
            debug!(worker_id, request_id = %envelope.id, %kind, "Caller gave up, skipping request");
            continue;
        }

        debug!(worker_id, request_id = %envelope.id, %kind, "Received request");

        let result = AssertUnwindSafe(handler.handle(envelope.request))
            .catch_unwind()
            .await
            .unwrap_or(Err(JournalError::HandlerPanicked));
        let ok = result.is_ok();

        if envelope.reply.send(result).is_err() {
            debug!(worker_id, request_id = %envelope.id, %kind, "Caller gone before reply");
        } else {
            debug!(worker_id, request_id = %envelope.id, %kind, ok, "Sent response");
        }
    }

    debug!(worker_id, "Drive worker stopped");
}

impl TaskHandler {
    async fn handle(&self, request: TaskRequest) -> Result<TaskResponse> {
        match request {
            TaskRequest::GetFile { id } => Ok(TaskResponse::File(self.store.get_file(&id).await?)),
            TaskRequest::InviteUser { id, email, role } => {
                self.store.grant_permission(&id, &email, &role).await?;
                info!(
                    file_id = %id,
                    email = %redact_if_sensitive("email", &email),
                    role = %role,
                    "Invited user"
                );
                Ok(TaskResponse::Invited)
            }
            TaskRequest::CreateJournal(vars) => self.create_journal(vars).await,
            TaskRequest::ListFiles(params) => {
                Ok(TaskResponse::Files(self.store.list_files(params).await?))
            }
            TaskRequest::ReadDocument { id } => {
                Ok(TaskResponse::Document(self.store.read_document(&id).await?))
            }
            TaskRequest::ConfigInfo => Ok(TaskResponse::ConfigInfo(
                self.cache.get_or_fetch(self.store.as_ref()).await?,
            )),
        }
    }

    #[instrument(skip(self, vars), fields(species = %vars.species))]
    async fn create_journal(&self, vars: TemplateVars) -> Result<TaskResponse> {
        let info = self.cache.get_or_fetch(self.store.as_ref()).await?;

        let document = NewDocument {
            template_id: info.template.item.id.clone(),
            name: vars.apply_to_string(&info.template.item.name),
            parent_id: info.journal_folder.id.clone(),
            replacements: vars.replacements(),
        };

        let item = self.store.create_document(document).await?;
        info!(journal_id = %item.id, name = %item.name, "Created journal");
        Ok(TaskResponse::JournalCreated(item))
    }
}
