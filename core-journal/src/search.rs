//! # Search Index Model
//!
//! Entries of the local full-text search index built from journal documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JournalError;

/// Partition of the search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Journal not (yet) linked to a patient; keyed by document URL
    Journal,
    /// Journal of a known patient; keyed by patient URL
    Patient,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Journal => "journal",
            Namespace::Patient => "patient",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "journal" => Ok(Namespace::Journal),
            "patient" => Ok(Namespace::Patient),
            other => Err(JournalError::Database(format!(
                "Invalid search namespace: {}",
                other
            ))),
        }
    }
}

/// Relative URL of a patient page
pub fn patient_url(id: i64) -> String {
    format!("/patient/{}", id)
}

/// Folder a journal lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchJournalInfo {
    #[serde(rename = "FolderURL")]
    pub folder_url: String,
    #[serde(rename = "FolderName")]
    pub folder_name: String,
}

/// Journal information attached to a patient entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPatientInfo {
    #[serde(rename = "JournalInfo")]
    pub journal_info: SearchJournalInfo,
    #[serde(rename = "JournalURL")]
    pub journal_url: String,
}

/// Structured data stored next to an entry and shown with search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraData {
    Patient(SearchPatientInfo),
    Journal(SearchJournalInfo),
}

impl ExtraData {
    fn journal_info(&self) -> &SearchJournalInfo {
        match self {
            ExtraData::Journal(info) => info,
            ExtraData::Patient(info) => &info.journal_info,
        }
    }

    /// Text appended to the indexed body so entries are findable by folder
    pub fn indexable_text(&self) -> String {
        format!("\n{}", self.journal_info().folder_name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One row of the search index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub namespace: Namespace,
    pub associated_url: String,
    pub header: String,
    pub body: String,
    /// JSON-serialized [`ExtraData`]
    pub extra_data: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub language: String,
    /// Content could not be fetched; body holds only the extra-data text
    pub skipped: bool,
}
