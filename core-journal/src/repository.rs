//! # Search Index Repository
//!
//! Persistence for search index entries and the patient lookup the indexer
//! needs to decide which namespace a journal belongs to.
//!
//! Timestamps are stored as Unix milliseconds so modification times compare
//! exactly against the remote service's values.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::search::{Namespace, SearchEntry};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for search index persistence
#[async_trait]
pub trait SearchIndexRepository: Send + Sync {
    /// Last recorded modification time of an entry
    ///
    /// `None` if there is no entry or it has no modification time.
    async fn updated_time(
        &self,
        namespace: Namespace,
        associated_url: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Insert or replace a full entry
    async fn upsert_entry(&self, entry: &SearchEntry) -> Result<()>;

    /// Insert or replace an entry whose content could not be fetched
    async fn upsert_skipped_entry(&self, entry: &SearchEntry) -> Result<()>;

    /// Delete an entry; returns whether a row was removed
    async fn delete_entry(&self, namespace: Namespace, associated_url: &str) -> Result<bool>;

    /// Refresh extra data, created time and header, leaving content alone
    ///
    /// Returns the number of rows affected.
    async fn update_metadata(
        &self,
        namespace: Namespace,
        associated_url: &str,
        extra_data: &str,
        created: Option<DateTime<Utc>>,
        header: &str,
    ) -> Result<u64>;

    /// IDs of patients whose journal URL references `file_id`, newest first
    ///
    /// The ID must fill the whole `/d/{id}` path segment; a URL for a longer
    /// ID that merely starts with `file_id` does not match.
    async fn patients_referencing(&self, file_id: &str) -> Result<Vec<i64>>;

    async fn find_entry(
        &self,
        namespace: Namespace,
        associated_url: &str,
    ) -> Result<Option<SearchEntry>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SearchIndexRepository
pub struct SqliteSearchIndexRepository {
    pool: SqlitePool,
}

impl SqliteSearchIndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the tables used by the indexer if they do not exist.
    ///
    /// The `patient` table is normally owned by the web application; a
    /// minimal version is created so the indexer also runs standalone.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_entries (
                namespace TEXT NOT NULL CHECK (namespace IN ('journal', 'patient')),
                associated_url TEXT NOT NULL,
                header TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                extra_data TEXT,
                lang TEXT NOT NULL,
                skipped INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER,
                updated_at INTEGER,
                PRIMARY KEY (namespace, associated_url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patient (
                id INTEGER PRIMARY KEY,
                journal_url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert(&self, entry: &SearchEntry, skipped: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_entries (
                namespace, associated_url, header, body, extra_data,
                lang, skipped, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (namespace, associated_url) DO UPDATE SET
                header = excluded.header,
                body = excluded.body,
                extra_data = excluded.extra_data,
                lang = excluded.lang,
                skipped = excluded.skipped,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entry.namespace.as_str())
        .bind(&entry.associated_url)
        .bind(&entry.header)
        .bind(&entry.body)
        .bind(&entry.extra_data)
        .bind(&entry.language)
        .bind(skipped)
        .bind(entry.created.map(|t| t.timestamp_millis()))
        .bind(entry.updated.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

/// Database row representation of a search entry
#[derive(Debug, FromRow)]
struct SearchEntryRow {
    namespace: String,
    associated_url: String,
    header: String,
    body: String,
    extra_data: Option<String>,
    lang: String,
    skipped: bool,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl TryFrom<SearchEntryRow> for SearchEntry {
    type Error = crate::error::JournalError;

    fn try_from(row: SearchEntryRow) -> Result<Self> {
        Ok(SearchEntry {
            namespace: row.namespace.parse()?,
            associated_url: row.associated_url,
            header: row.header,
            body: row.body,
            extra_data: row.extra_data,
            created: from_millis(row.created_at),
            updated: from_millis(row.updated_at),
            language: row.lang,
            skipped: row.skipped,
        })
    }
}

#[async_trait]
impl SearchIndexRepository for SqliteSearchIndexRepository {
    async fn updated_time(
        &self,
        namespace: Namespace,
        associated_url: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let updated: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT updated_at FROM search_entries WHERE namespace = ? AND associated_url = ?",
        )
        .bind(namespace.as_str())
        .bind(associated_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(from_millis(updated.flatten()))
    }

    async fn upsert_entry(&self, entry: &SearchEntry) -> Result<()> {
        self.upsert(entry, false).await
    }

    async fn upsert_skipped_entry(&self, entry: &SearchEntry) -> Result<()> {
        self.upsert(entry, true).await
    }

    async fn delete_entry(&self, namespace: Namespace, associated_url: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM search_entries WHERE namespace = ? AND associated_url = ?")
                .bind(namespace.as_str())
                .bind(associated_url)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_metadata(
        &self,
        namespace: Namespace,
        associated_url: &str,
        extra_data: &str,
        created: Option<DateTime<Utc>>,
        header: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE search_entries SET
                extra_data = ?,
                created_at = ?,
                header = ?
            WHERE namespace = ? AND associated_url = ?
            "#,
        )
        .bind(extra_data)
        .bind(created.map(|t| t.timestamp_millis()))
        .bind(header)
        .bind(namespace.as_str())
        .bind(associated_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn patients_referencing(&self, file_id: &str) -> Result<Vec<i64>> {
        if file_id.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM patient
            WHERE journal_url IS NOT NULL
              AND instr(replace(replace(journal_url, '?', '/'), '#', '/') || '/', '/d/' || ? || '/') > 0
            ORDER BY id DESC
            "#,
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_entry(
        &self,
        namespace: Namespace,
        associated_url: &str,
    ) -> Result<Option<SearchEntry>> {
        let row = sqlx::query_as::<_, SearchEntryRow>(
            r#"
            SELECT namespace, associated_url, header, body, extra_data,
                   lang, skipped, created_at, updated_at
            FROM search_entries
            WHERE namespace = ? AND associated_url = ?
            "#,
        )
        .bind(namespace.as_str())
        .bind(associated_url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SearchEntry::try_from).transpose()
    }
}
