//! # Service Configuration
//!
//! Configuration for the journal service, loaded from a JSON file or built
//! in code through [`ServiceConfig::builder`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ServiceConfig;
//!
//! let config = ServiceConfig::from_file("config.json")?;
//! let token = config.drive.resolve_access_token()?;
//! ```
//!
//! Every section is optional in the file except `drive`, which must name
//! the journal folder and the journal template. Validation fails fast and
//! names the offending field.

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default environment variable holding the Drive access token
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub drive: DriveSettings,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub startup: StartupConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote document service settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveSettings {
    /// Inline access token; takes precedence over `access_token_env`
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Environment variable to read the access token from
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Shared drive ID, if the journals live on a shared drive
    #[serde(default)]
    pub drive_base: Option<String>,

    /// Folder new journals are created in
    #[serde(default)]
    pub journal_folder: String,

    /// Google Docs template copied for new journals
    #[serde(default)]
    pub template_file: String,

    /// Older journal folders that are still indexed and shown
    #[serde(default)]
    pub extra_journal_folders: Vec<String>,
}

impl std::fmt::Debug for DriveSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSettings")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token_env", &self.access_token_env)
            .field("drive_base", &self.drive_base)
            .field("journal_folder", &self.journal_folder)
            .field("template_file", &self.template_file)
            .field("extra_journal_folders", &self.extra_journal_folders)
            .finish()
    }
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            access_token_env: default_access_token_env(),
            drive_base: None,
            journal_folder: String::new(),
            template_file: String::new(),
            extra_journal_folders: Vec::new(),
        }
    }
}

impl DriveSettings {
    /// Return the configured access token, falling back to the environment.
    pub fn resolve_access_token(&self) -> Result<String> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        match std::env::var(&self.access_token_env) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::Config(format!(
                "drive.access_token is not set and environment variable {} is empty",
                self.access_token_env
            ))),
        }
    }

    /// All folders to index: the journal folder first, then the extra ones.
    pub fn indexed_folders(&self) -> Vec<String> {
        std::iter::once(self.journal_folder.clone())
            .chain(self.extra_journal_folders.iter().cloned())
            .collect()
    }
}

/// Request worker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of the request queue
    pub queue_capacity: usize,
    /// Number of workers draining the queue
    pub workers: usize,
    /// Default deadline for wrapper calls, in seconds
    pub request_timeout_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            workers: 1,
            request_timeout_secs: None,
        }
    }
}

impl WorkerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Folder indexer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub enabled: bool,
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Language tag stored with each indexed entry
    pub language: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
            language: "norwegian".to_string(),
        }
    }
}

impl IndexerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://rehab.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Attempts per request including the first; 1 disables retries
    pub max_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 1,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Startup warm-up settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Attempts at fetching the config info before giving up
    pub config_fetch_attempts: u32,
    /// Initial delay between attempts; doubled after each failure
    pub config_fetch_backoff_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            config_fetch_attempts: 5,
            config_fetch_backoff_ms: 2000,
        }
    }
}

impl StartupConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.config_fetch_backoff_ms.saturating_mul(factor))
    }
}

fn default_access_token_env() -> String {
    DEFAULT_ACCESS_TOKEN_ENV.to_string()
}

impl ServiceConfig {
    /// Creates a new builder for constructing a `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ServiceConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.drive.journal_folder.trim().is_empty() {
            return Err(Error::Config(
                "drive.journal_folder must be set".to_string(),
            ));
        }

        if self.drive.template_file.trim().is_empty() {
            return Err(Error::Config(
                "drive.template_file must be set".to_string(),
            ));
        }

        if self
            .drive
            .extra_journal_folders
            .iter()
            .any(|id| id.trim().is_empty())
        {
            return Err(Error::Config(
                "drive.extra_journal_folders must not contain empty IDs".to_string(),
            ));
        }

        if self.worker.queue_capacity == 0 {
            return Err(Error::Config(
                "worker.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.worker.workers == 0 {
            return Err(Error::Config(
                "worker.workers must be greater than 0".to_string(),
            ));
        }

        if self.worker.request_timeout_secs == Some(0) {
            return Err(Error::Config(
                "worker.request_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        if self.indexer.enabled && self.indexer.interval_secs == 0 {
            return Err(Error::Config(
                "indexer.interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.database.url.is_empty() {
            return Err(Error::Config("database.url cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.http.max_attempts == 0 {
            return Err(Error::Config(
                "http.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.startup.config_fetch_attempts == 0 {
            return Err(Error::Config(
                "startup.config_fetch_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`ServiceConfig`] instances.
///
/// Unset sections fall back to their defaults; [`build`](Self::build)
/// runs [`ServiceConfig::validate`].
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    drive: DriveSettings,
    worker: WorkerConfig,
    indexer: IndexerConfig,
    database: DatabaseConfig,
    http: HttpConfig,
    startup: StartupConfig,
    logging: LoggingConfig,
}

impl ServiceConfigBuilder {
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.drive.access_token = Some(token.into());
        self
    }

    pub fn drive_base(mut self, drive_id: impl Into<String>) -> Self {
        self.drive.drive_base = Some(drive_id.into());
        self
    }

    pub fn journal_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.drive.journal_folder = folder_id.into();
        self
    }

    pub fn template_file(mut self, file_id: impl Into<String>) -> Self {
        self.drive.template_file = file_id.into();
        self
    }

    pub fn extra_journal_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.drive.extra_journal_folders.push(folder_id.into());
        self
    }

    pub fn worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn indexer(mut self, indexer: IndexerConfig) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database.url = url.into();
        self
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn startup(mut self, startup: StartupConfig) -> Self {
        self.startup = startup;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        let config = ServiceConfig {
            drive: self.drive,
            worker: self.worker,
            indexer: self.indexer,
            database: self.database,
            http: self.http,
            startup: self.startup,
            logging: self.logging,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ServiceConfigBuilder {
        ServiceConfig::builder()
            .journal_folder("journals")
            .template_file("template")
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = ServiceConfig::from_json(
            r#"{"drive": {"journal_folder": "journals", "template_file": "template"}}"#,
        )
        .unwrap();

        assert_eq!(config.worker.queue_capacity, 100);
        assert_eq!(config.worker.workers, 1);
        assert_eq!(config.worker.request_timeout(), None);
        assert!(config.indexer.enabled);
        assert_eq!(config.indexer.interval(), Duration::from_secs(600));
        assert_eq!(config.indexer.language, "norwegian");
        assert_eq!(config.database.url, "sqlite://rehab.db");
        assert_eq!(config.http.max_attempts, 1);
        assert_eq!(config.startup.config_fetch_attempts, 5);
        assert_eq!(config.drive.access_token_env, DEFAULT_ACCESS_TOKEN_ENV);
    }

    #[test]
    fn test_missing_journal_folder() {
        let err = ServiceConfig::builder()
            .template_file("template")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("drive.journal_folder"));
    }

    #[test]
    fn test_missing_template() {
        let err = ServiceConfig::builder()
            .journal_folder("journals")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("drive.template_file"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let err = minimal()
            .worker(WorkerConfig {
                queue_capacity: 0,
                ..WorkerConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("worker.queue_capacity"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = minimal()
            .worker(WorkerConfig {
                workers: 0,
                ..WorkerConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("worker.workers"));
    }

    #[test]
    fn test_disabled_indexer_ignores_interval() {
        let config = minimal()
            .indexer(IndexerConfig {
                enabled: false,
                interval_secs: 0,
                ..IndexerConfig::default()
            })
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_inline_token_wins() {
        let config = minimal().access_token("inline").build().unwrap();
        assert_eq!(config.drive.resolve_access_token().unwrap(), "inline");
    }

    #[test]
    fn test_token_from_env() {
        let mut config = minimal().build().unwrap();
        config.drive.access_token_env = "REHAB_TEST_TOKEN_FROM_ENV".to_string();

        std::env::set_var("REHAB_TEST_TOKEN_FROM_ENV", "from-env");
        assert_eq!(config.drive.resolve_access_token().unwrap(), "from-env");

        config.drive.access_token_env = "REHAB_TEST_TOKEN_UNSET".to_string();
        assert!(config.drive.resolve_access_token().is_err());
    }

    #[test]
    fn test_indexed_folders_order() {
        let config = minimal()
            .extra_journal_folder("old1")
            .extra_journal_folder("old2")
            .build()
            .unwrap();
        assert_eq!(
            config.drive.indexed_folders(),
            vec!["journals".to_string(), "old1".to_string(), "old2".to_string()]
        );
    }

    #[test]
    fn test_startup_backoff_doubles() {
        let startup = StartupConfig::default();
        assert_eq!(startup.backoff(1), Duration::from_millis(2000));
        assert_eq!(startup.backoff(2), Duration::from_millis(4000));
        assert_eq!(startup.backoff(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = minimal().access_token("super-secret").build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_invalid_json() {
        let err = ServiceConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
