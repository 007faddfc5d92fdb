//! Remote Document Storage Abstraction
//!
//! The remote document service (journals, folders, templates) is owned by an
//! external provider. The core only ever sees read-only mirrors of its
//! resources and talks to it through [`DocumentStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Roles that allow editing and sharing a remote item
const WRITE_ROLES: &[&str] = &["owner", "organizer", "fileOrganizer", "writer"];

/// Access grant on a remote item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub display_name: String,
    pub email: String,
    pub role: String,
}

impl Permission {
    /// Whether this grant allows writing (and therefore sharing)
    pub fn can_write(&self) -> bool {
        WRITE_ROLES.contains(&self.role.as_str())
    }
}

/// Remote document or folder
///
/// Mirrors an externally owned resource. Never mutated locally; refresh it by
/// fetching it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub trashed: bool,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub permissions: Vec<Permission>,
}

impl RemoteItem {
    /// Browser URL of the item viewed as a folder
    pub fn folder_url(&self) -> String {
        folder_url(&self.id)
    }

    /// Browser URL of the item viewed as a document
    pub fn document_url(&self) -> String {
        format!("https://docs.google.com/document/d/{}", self.id)
    }

    /// Whether the given e-mail address holds a writing role on this item
    pub fn can_share(&self, email: &str) -> bool {
        self.permissions
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .is_some_and(Permission::can_write)
    }
}

/// Browser URL of a folder by ID
pub fn folder_url(id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", id)
}

/// Document content exported as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDocument {
    pub item: RemoteItem,
    /// Markdown export with inline images and bold markers removed
    pub content: String,
}

/// Parameters for one page of a folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilesParams {
    /// Folder whose documents are listed
    pub parent: String,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Continuation token from a previous page
    pub page_token: Option<String>,
}

impl ListFilesParams {
    pub fn new(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            ..Self::default()
        }
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilesResult {
    pub folder: RemoteItem,
    /// Documents ordered by modification time, newest first
    pub files: Vec<RemoteItem>,
    pub next_page_token: Option<String>,
}

/// Match-case, replace-all text substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReplacement {
    pub placeholder: String,
    pub replacement: String,
}

/// Request to create a document from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub template_id: String,
    pub name: String,
    pub parent_id: String,
    pub replacements: Vec<TextReplacement>,
}

/// Remote document service trait
///
/// Implemented by provider crates (e.g. Google Drive). Implementations must
/// not retry on their own behalf; callers decide.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{DocumentStore, ListFilesParams};
///
/// async fn count_journals(store: &dyn DocumentStore, folder: &str) -> Result<usize> {
///     let page = store.list_files(ListFilesParams::new(folder)).await?;
///     Ok(page.files.len())
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a file or folder, including its permissions
    async fn get_file(&self, id: &str) -> Result<RemoteItem>;

    /// List one page of documents in a folder
    async fn list_files(&self, params: ListFilesParams) -> Result<ListFilesResult>;

    /// Fetch a document together with its text content
    async fn read_document(&self, id: &str) -> Result<RemoteDocument>;

    /// Copy a template into a folder and apply text replacements
    ///
    /// If the replacements cannot be applied the copy is removed again.
    async fn create_document(&self, document: NewDocument) -> Result<RemoteItem>;

    /// Grant a user a role on a file, notifying them by e-mail
    async fn grant_permission(&self, file_id: &str, email: &str, role: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(email: &str, role: &str) -> Permission {
        Permission {
            display_name: "Someone".to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_item_urls() {
        let item = RemoteItem {
            id: "abc123".to_string(),
            ..RemoteItem::default()
        };

        assert_eq!(
            item.folder_url(),
            "https://drive.google.com/drive/folders/abc123"
        );
        assert_eq!(
            item.document_url(),
            "https://docs.google.com/document/d/abc123"
        );
    }

    #[test]
    fn test_permission_roles() {
        assert!(permission("a@b.no", "owner").can_write());
        assert!(permission("a@b.no", "fileOrganizer").can_write());
        assert!(permission("a@b.no", "writer").can_write());
        assert!(!permission("a@b.no", "reader").can_write());
        assert!(!permission("a@b.no", "commenter").can_write());
    }

    #[test]
    fn test_can_share() {
        let item = RemoteItem {
            id: "doc".to_string(),
            permissions: vec![
                permission("editor@rehab.no", "writer"),
                permission("viewer@rehab.no", "reader"),
            ],
            ..RemoteItem::default()
        };

        assert!(item.can_share("Editor@Rehab.no"));
        assert!(!item.can_share("viewer@rehab.no"));
        assert!(!item.can_share("stranger@rehab.no"));
    }

    #[test]
    fn test_list_params_builder() {
        let params = ListFilesParams::new("folder").with_page_token("next");
        assert_eq!(params.parent, "folder");
        assert_eq!(params.page_token.as_deref(), Some("next"));
        assert!(params.modified_after.is_none());
    }
}
