//! Google Drive API connector implementation
//!
//! Implements the `DocumentStore` trait for Google Drive API v3 and the
//! Google Docs API v1 (placeholder replacement).

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    DocumentStore, ListFilesParams, ListFilesResult, NewDocument, Permission, RemoteDocument,
    RemoteItem,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{
    BatchUpdateRequest, CopyFileRequest, DriveFile, DrivePermission, FilesListResponse,
    PermissionListResponse,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Docs API base URL
const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1";

/// MIME type of native Google Docs
const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";

/// Fields to request for single file resources
const FILE_FIELDS: &str = "id,name,trashed,createdTime,modifiedTime";

/// Fields to request for listings
const LIST_FIELDS: &str = "files(id, name, modifiedTime, createdTime, trashed), nextPageToken";

const PERMISSION_FIELDS: &str = "permissions(displayName,emailAddress,role)";

/// Layout used for `modifiedTime` comparisons in list queries
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static INLINE_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<data:image/[a-zA-Z]+;base64,[^>]+>")
        .expect("INLINE_IMAGE_RE: hardcoded regex is valid")
});

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("BOLD_RE: hardcoded regex is valid"));

/// Remove inline base64 images and bold markers from a Markdown export
pub fn clean_markdown(markdown: &str) -> String {
    let without_images = INLINE_IMAGE_RE.replace_all(markdown, "");
    BOLD_RE.replace_all(&without_images, "$1").into_owned()
}

/// Google Drive API connector
///
/// Implements `DocumentStore` for Google Drive API v3.
///
/// # Features
///
/// - File lookup including sharing permissions
/// - Paginated listing of Google Docs in a folder, newest first
/// - Markdown export with inline images stripped
/// - Template copy with placeholder replacement (and cleanup on failure)
/// - Shared drive support
///
/// The connector never retries on its own; transport retries are governed by
/// the `HttpClient` it is given.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::{DocumentStore, ListFilesParams};
///
/// let connector = GoogleDriveConnector::new(http_client, access_token, None);
/// let page = connector.list_files(ListFilesParams::new(folder_id)).await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,

    /// Shared drive ID, if the journals live on a shared drive
    drive_base: Option<String>,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with `drive` scope
    /// * `drive_base` - Shared drive ID; `None` for "My Drive"
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        access_token: String,
        drive_base: Option<String>,
    ) -> Self {
        Self {
            http_client,
            access_token,
            drive_base: drive_base.filter(|id| !id.is_empty()),
        }
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(rfc3339: Option<&str>) -> Option<DateTime<Utc>> {
        rfc3339
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Convert DriveFile to RemoteItem
    fn convert_file(drive_file: DriveFile, permissions: Vec<DrivePermission>) -> RemoteItem {
        RemoteItem {
            id: drive_file.id,
            name: drive_file.name,
            trashed: drive_file.trashed,
            created_time: Self::parse_timestamp(drive_file.created_time.as_deref()),
            modified_time: Self::parse_timestamp(drive_file.modified_time.as_deref()),
            permissions: permissions
                .into_iter()
                .map(|p| Permission {
                    display_name: p.display_name.unwrap_or_default(),
                    email: p.email_address.unwrap_or_default(),
                    role: p.role,
                })
                .collect(),
        }
    }

    /// Append `supportsAllDrives` when working against a shared drive
    fn with_drive_support(&self, mut url: String) -> String {
        if self.drive_base.is_some() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("supportsAllDrives=true");
        }
        url
    }

    /// Build the `q` expression for a folder listing
    fn list_query(params: &ListFilesParams) -> String {
        let mut query = format!(
            "mimeType = '{}' and '{}' in parents",
            DOCUMENT_MIME_TYPE, params.parent
        );
        if let Some(after) = params.modified_after {
            query.push_str(&format!(
                " and modifiedTime > '{}'",
                after.format(QUERY_TIME_FORMAT)
            ));
        }
        if let Some(before) = params.modified_before {
            query.push_str(&format!(
                " and modifiedTime < '{}'",
                before.format(QUERY_TIME_FORMAT)
            ));
        }
        query
    }

    fn list_url(&self, params: &ListFilesParams) -> String {
        let mut url = format!(
            "{}/files?q={}&orderBy={}&fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(&Self::list_query(params)),
            urlencoding::encode("modifiedTime desc"),
            urlencoding::encode(LIST_FIELDS),
        );

        if let Some(drive_id) = &self.drive_base {
            url.push_str(&format!(
                "&supportsAllDrives=true&includeItemsFromAllDrives=true&corpora=drive&driveId={}",
                urlencoding::encode(drive_id)
            ));
        }

        if let Some(page_token) = &params.page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(page_token)));
        }

        url
    }

    /// Send an authorized request and map non-success statuses to errors
    async fn send(&self, request: HttpRequest, subject: &str) -> Result<HttpResponse> {
        let request = request
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            return Ok(response);
        }

        warn!(status = response.status, subject, "API request failed");
        Err(Self::status_error(&response, subject).into())
    }

    fn status_error(response: &HttpResponse, subject: &str) -> GoogleDriveError {
        let message = String::from_utf8_lossy(&response.body).to_string();
        match response.status {
            401 | 403 => GoogleDriveError::AuthenticationFailed(message),
            404 => GoogleDriveError::FileNotFound {
                file_id: subject.to_string(),
            },
            429 => GoogleDriveError::RateLimitExceeded {
                retry_after_seconds: response
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(60),
            },
            status_code => GoogleDriveError::ApiError {
                status_code,
                message,
            },
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    async fn fetch_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = self.with_drive_support(format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            FILE_FIELDS
        ));
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url), file_id)
            .await?;
        Self::parse(&response, "file metadata")
    }

    async fn fetch_permissions(&self, file_id: &str) -> Result<Vec<DrivePermission>> {
        let url = self.with_drive_support(format!(
            "{}/files/{}/permissions?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            urlencoding::encode(PERMISSION_FIELDS)
        ));
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url), file_id)
            .await?;
        let list: PermissionListResponse = Self::parse(&response, "permission list")?;
        Ok(list.permissions)
    }

    async fn export_markdown(&self, file_id: &str) -> Result<String> {
        let url = format!(
            "{}/files/{}/export?mimeType={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            urlencoding::encode("text/markdown")
        );
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url), file_id)
            .await?;
        let text = String::from_utf8(response.body.to_vec())
            .map_err(|e| GoogleDriveError::ParseError(format!("Export is not UTF-8: {}", e)))?;
        Ok(clean_markdown(&text))
    }

    async fn copy_file(&self, document: &NewDocument) -> Result<DriveFile> {
        let url = self.with_drive_support(format!(
            "{}/files/{}/copy?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(&document.template_id),
            FILE_FIELDS
        ));
        let body = CopyFileRequest {
            name: &document.name,
            parents: vec![document.parent_id.as_str()],
        };
        let request = HttpRequest::new(HttpMethod::Post, url).json(&body)?;
        let response = self.send(request, &document.template_id).await?;
        Self::parse(&response, "copied file")
    }

    async fn replace_text(&self, document_id: &str, document: &NewDocument) -> Result<()> {
        if document.replacements.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/documents/{}:batchUpdate",
            DOCS_API_BASE,
            urlencoding::encode(document_id)
        );
        let body = BatchUpdateRequest::replace_all(
            document
                .replacements
                .iter()
                .map(|r| (r.placeholder.as_str(), r.replacement.as_str())),
        );
        let request = HttpRequest::new(HttpMethod::Post, url).json(&body)?;
        self.send(request, document_id).await?;
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let url = self.with_drive_support(format!(
            "{}/files/{}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id)
        ));
        self.send(HttpRequest::new(HttpMethod::Delete, url), file_id)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for GoogleDriveConnector {
    #[instrument(skip(self), fields(file_id = %id))]
    async fn get_file(&self, id: &str) -> Result<RemoteItem> {
        debug!("Getting file with permissions");

        let file = self.fetch_file(id).await?;
        let permissions = self.fetch_permissions(id).await?;

        Ok(Self::convert_file(file, permissions))
    }

    #[instrument(skip(self), fields(parent = %params.parent))]
    async fn list_files(&self, params: ListFilesParams) -> Result<ListFilesResult> {
        let folder = self.fetch_file(&params.parent).await?;

        let response = self
            .send(
                HttpRequest::new(HttpMethod::Get, self.list_url(&params)),
                &params.parent,
            )
            .await?;
        let list: FilesListResponse = Self::parse(&response, "files list response")?;

        let files: Vec<RemoteItem> = list
            .files
            .into_iter()
            .map(|f| Self::convert_file(f, Vec::new()))
            .collect();

        info!(
            count = files.len(),
            more = list.next_page_token.is_some(),
            "Listed documents from Google Drive"
        );

        Ok(ListFilesResult {
            folder: Self::convert_file(folder, Vec::new()),
            files,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    #[instrument(skip(self), fields(file_id = %id))]
    async fn read_document(&self, id: &str) -> Result<RemoteDocument> {
        let file = self.fetch_file(id).await?;
        let content = self.export_markdown(id).await?;

        debug!(bytes = content.len(), "Exported document");

        Ok(RemoteDocument {
            item: Self::convert_file(file, Vec::new()),
            content,
        })
    }

    #[instrument(skip(self, document), fields(template = %document.template_id, name = %document.name))]
    async fn create_document(&self, document: NewDocument) -> Result<RemoteItem> {
        let copy = self.copy_file(&document).await?;

        if let Err(cause) = self.replace_text(&copy.id, &document).await {
            warn!(document_id = %copy.id, error = %cause, "Placeholder replacement failed, removing copy");
            return Err(match self.delete_file(&copy.id).await {
                Ok(()) => cause,
                Err(cleanup) => GoogleDriveError::CleanupFailed {
                    document_id: copy.id,
                    cause: cause.to_string(),
                    cleanup: cleanup.to_string(),
                }
                .into(),
            });
        }

        info!(document_id = %copy.id, "Created document from template");
        Ok(Self::convert_file(copy, Vec::new()))
    }

    #[instrument(skip(self, email), fields(file_id = %file_id, role = %role))]
    async fn grant_permission(&self, file_id: &str, email: &str, role: &str) -> Result<()> {
        let url = self.with_drive_support(format!(
            "{}/files/{}/permissions?sendNotificationEmail=true",
            DRIVE_API_BASE,
            urlencoding::encode(file_id)
        ));
        let body = DrivePermission {
            display_name: None,
            email_address: Some(email.to_string()),
            role: role.to_string(),
            kind: Some("user".to_string()),
        };
        let request = HttpRequest::new(HttpMethod::Post, url).json(&body)?;
        self.send(request, file_id).await?;

        info!("Granted permission");
        Ok(())
    }
}
