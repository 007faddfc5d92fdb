//! Google Drive and Docs API types
//!
//! Data structures for (de)serializing Drive API v3 and Docs API v1 payloads.

use serde::{Deserialize, Serialize};

/// Google Drive API file resource
///
/// Only the fields requested through `fields=` are present; everything else
/// is optional.
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    #[serde(default)]
    pub name: String,

    /// Creation time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// Whether file is trashed
    #[serde(default)]
    pub trashed: bool,
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    pub next_page_token: Option<String>,
}

/// Google Drive API permission resource
///
/// See: https://developers.google.com/drive/api/v3/reference/permissions#resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivePermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,

    pub role: String,

    /// Grantee type (`user`, `group`, `domain`, `anyone`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Google Drive API permissions.list response
#[derive(Debug, Deserialize)]
pub struct PermissionListResponse {
    #[serde(default)]
    pub permissions: Vec<DrivePermission>,
}

/// Body of files.copy
#[derive(Debug, Serialize)]
pub struct CopyFileRequest<'a> {
    pub name: &'a str,
    pub parents: Vec<&'a str>,
}

/// Body of documents.batchUpdate
///
/// See: https://developers.google.com/docs/api/reference/rest/v1/documents/batchUpdate
#[derive(Debug, Serialize)]
pub struct BatchUpdateRequest {
    pub requests: Vec<DocsRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsRequest {
    pub replace_all_text: ReplaceAllTextRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAllTextRequest {
    pub contains_text: SubstringMatchCriteria,
    pub replace_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstringMatchCriteria {
    pub text: String,
    pub match_case: bool,
}

impl BatchUpdateRequest {
    /// Match-case replace-all requests, one per placeholder
    pub fn replace_all<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            requests: pairs
                .into_iter()
                .map(|(placeholder, replacement)| DocsRequest {
                    replace_all_text: ReplaceAllTextRequest {
                        contains_text: SubstringMatchCriteria {
                            text: placeholder.to_string(),
                            match_case: true,
                        },
                        replace_text: replacement.to_string(),
                    },
                })
                .collect(),
        }
    }
}
