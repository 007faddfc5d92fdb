//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host implementations (reqwest HTTP client, Google
//! Drive connector, SQLite pool) into the journal core: it starts the drive
//! worker, warms the journal config cache and launches the search indexer.

pub mod error;

pub use error::{CoreError, Result};

use std::str::FromStr;
use std::sync::Arc;

use bridge_desktop::ReqwestHttpClient;
use bridge_traits::{storage::DocumentStore, RetryPolicy};
use core_journal::{
    CallOptions, ConfigInfo, ConfigInfoCache, DriveWorker, IndexerSettings,
    SearchIndexRepository, SearchIndexer, SqliteSearchIndexRepository,
};
use core_runtime::config::{DatabaseConfig, ServiceConfig, StartupConfig};
use provider_google_drive::GoogleDriveConnector;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running journal core
pub struct CoreService {
    worker: Arc<DriveWorker>,
    repository: Arc<SqliteSearchIndexRepository>,
    shutdown: CancellationToken,
    indexer: Option<JoinHandle<()>>,
}

impl CoreService {
    /// Build every component from configuration and start the service.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, no access token is available,
    /// the database cannot be opened, or the journal config info cannot be
    /// fetched within `startup.config_fetch_attempts` attempts.
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let access_token = config.drive.resolve_access_token()?;

        let http_client = ReqwestHttpClient::builder()
            .timeout(config.http.timeout())
            .retry_policy(RetryPolicy {
                max_attempts: config.http.max_attempts,
                ..RetryPolicy::default()
            })
            .build()?;

        let store = Arc::new(GoogleDriveConnector::new(
            Arc::new(http_client),
            access_token,
            config.drive.drive_base.clone(),
        ));

        let pool = connect_database(&config.database).await?;

        Self::from_parts(config, store, pool).await
    }

    /// Start the service on an existing store and database pool.
    pub async fn from_parts(
        config: ServiceConfig,
        store: Arc<dyn DocumentStore>,
        pool: SqlitePool,
    ) -> Result<Self> {
        config.validate()?;

        let repository = Arc::new(SqliteSearchIndexRepository::new(pool));
        repository.ensure_schema().await?;

        let shutdown = CancellationToken::new();
        let cache = Arc::new(ConfigInfoCache::new(&config.drive));
        let worker = DriveWorker::start(&config.worker, store, cache, shutdown.child_token());

        if let Err(e) = warm_up(&worker, &config.startup).await {
            worker.stop().await;
            return Err(e);
        }

        let indexer = if config.indexer.enabled {
            let indexer = SearchIndexer::new(
                Arc::clone(&worker),
                Arc::clone(&repository) as Arc<dyn SearchIndexRepository>,
                IndexerSettings::from_config(&config.drive, &config.indexer),
            );
            Some(indexer.spawn(shutdown.child_token()))
        } else {
            info!("Search indexer disabled");
            None
        };

        info!(
            folders = ?config.drive.indexed_folders(),
            indexer = config.indexer.enabled,
            "Rehab core started"
        );

        Ok(Self {
            worker,
            repository,
            shutdown,
            indexer,
        })
    }

    /// Queue handle used for every remote document call.
    pub fn worker(&self) -> Arc<DriveWorker> {
        Arc::clone(&self.worker)
    }

    pub fn repository(&self) -> Arc<SqliteSearchIndexRepository> {
        Arc::clone(&self.repository)
    }

    /// Current journal configuration, refetched after the cache is invalidated.
    pub async fn config_info(&self) -> Result<Arc<ConfigInfo>> {
        Ok(self.worker.config_info(&CallOptions::default()).await?)
    }

    /// Stop the indexer and the worker and wait for both.
    pub async fn shutdown(self) {
        info!("Shutting down rehab core");
        self.shutdown.cancel();

        if let Some(handle) = self.indexer {
            if let Err(e) = handle.await {
                warn!(error = %e, "Search indexer ended abnormally");
            }
        }

        self.worker.stop().await;
    }
}

/// Open (creating if missing) the SQLite database.
pub async fn connect_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Fetch the journal config info, retrying with exponential backoff.
async fn warm_up(worker: &DriveWorker, startup: &StartupConfig) -> Result<Arc<ConfigInfo>> {
    let attempts = startup.config_fetch_attempts.max(1);
    let opts = CallOptions::default();

    for attempt in 1..=attempts {
        match worker.config_info(&opts).await {
            Ok(info) => return Ok(info),
            Err(e) if attempt < attempts => {
                let delay = startup.backoff(attempt);
                warn!(
                    attempt,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to fetch journal config info"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(CoreError::InitializationFailed(format!(
                    "journal config info unavailable after {} attempts: {}",
                    attempts, e
                )));
            }
        }
    }

    Err(CoreError::InitializationFailed(
        "journal config info was never fetched".to_string(),
    ))
}
