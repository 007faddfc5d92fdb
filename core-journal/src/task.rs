//! # Worker Tasks
//!
//! Requests and responses exchanged with the [`DriveWorker`](crate::worker::DriveWorker).
//! Each request variant carries exactly the payload its handler needs, and each
//! response variant the value the matching wrapper returns.

use bridge_traits::storage::{ListFilesParams, ListFilesResult, RemoteDocument, RemoteItem};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config_cache::ConfigInfo;
use crate::error::Result;
use crate::template::TemplateVars;

/// Kind of remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    GetFile,
    InviteUser,
    CreateJournal,
    ListFiles,
    ReadDocument,
    ConfigInfo,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GetFile => "GetFile",
            TaskKind::InviteUser => "InviteUser",
            TaskKind::CreateJournal => "CreateJournal",
            TaskKind::ListFiles => "ListFiles",
            TaskKind::ReadDocument => "ReadDocument",
            TaskKind::ConfigInfo => "ConfigInfo",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request processed by the worker
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    GetFile {
        id: String,
    },
    /// Share a file or folder with a user
    InviteUser {
        id: String,
        email: String,
        role: String,
    },
    CreateJournal(TemplateVars),
    ListFiles(ListFilesParams),
    ReadDocument {
        id: String,
    },
    /// Fetch the journal configuration unless it is cached
    ConfigInfo,
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::GetFile { .. } => TaskKind::GetFile,
            TaskRequest::InviteUser { .. } => TaskKind::InviteUser,
            TaskRequest::CreateJournal(_) => TaskKind::CreateJournal,
            TaskRequest::ListFiles(_) => TaskKind::ListFiles,
            TaskRequest::ReadDocument { .. } => TaskKind::ReadDocument,
            TaskRequest::ConfigInfo => TaskKind::ConfigInfo,
        }
    }
}

/// Successful worker reply
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResponse {
    File(RemoteItem),
    Invited,
    JournalCreated(RemoteItem),
    Files(ListFilesResult),
    Document(RemoteDocument),
    ConfigInfo(Arc<ConfigInfo>),
}

impl TaskResponse {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResponse::File(_) => TaskKind::GetFile,
            TaskResponse::Invited => TaskKind::InviteUser,
            TaskResponse::JournalCreated(_) => TaskKind::CreateJournal,
            TaskResponse::Files(_) => TaskKind::ListFiles,
            TaskResponse::Document(_) => TaskKind::ReadDocument,
            TaskResponse::ConfigInfo(_) => TaskKind::ConfigInfo,
        }
    }
}

/// Queued request together with its single-use reply channel
pub(crate) struct TaskEnvelope {
    pub id: Uuid,
    pub request: TaskRequest,
    pub reply: oneshot::Sender<Result<TaskResponse>>,
}

/// Per-call limits for worker requests
///
/// Both the wait for a queue slot and the wait for the reply are bounded by
/// `timeout` and aborted when `cancel` fires. A request abandoned while still
/// queued is skipped by the worker.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind() {
        let request = TaskRequest::InviteUser {
            id: "folder".to_string(),
            email: "a@b.no".to_string(),
            role: "writer".to_string(),
        };
        assert_eq!(request.kind(), TaskKind::InviteUser);
        assert_eq!(
            TaskRequest::ListFiles(ListFilesParams::new("f")).kind(),
            TaskKind::ListFiles
        );
    }

    #[test]
    fn test_response_kind_matches_request_kind() {
        assert_eq!(TaskResponse::Invited.kind(), TaskKind::InviteUser);
        assert_eq!(
            TaskResponse::File(RemoteItem::default()).kind(),
            TaskKind::GetFile
        );
        assert_eq!(TaskKind::ReadDocument.to_string(), "ReadDocument");
        assert_eq!(TaskRequest::ConfigInfo.kind(), TaskKind::ConfigInfo);
        assert_eq!(TaskKind::ConfigInfo.as_str(), "ConfigInfo");
    }

    #[test]
    fn test_call_options_builder() {
        let token = CancellationToken::new();
        let opts = CallOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_cancel(token.clone());

        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        token.cancel();
        assert!(opts.cancel.is_some_and(|t| t.is_cancelled()));
    }
}
