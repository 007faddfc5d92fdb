use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

use crate::task::TaskKind;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Remote call failed: {0}")]
    Remote(#[from] BridgeError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request worker has stopped")]
    WorkerStopped,

    #[error("Request handler panicked")]
    HandlerPanicked,

    #[error("Expected {expected} response, got {actual}")]
    UnexpectedResponse { expected: TaskKind, actual: TaskKind },

    #[error("Failed to fetch {what}: {source}")]
    ConfigFetch {
        what: String,
        #[source]
        source: BridgeError,
    },

    #[error("Journal template is missing variables: {}", missing.join(", "))]
    InvalidTemplate { missing: Vec<String> },

    #[error("{file}: {source} (created skipped entry)")]
    Skipped {
        file: String,
        #[source]
        source: Box<JournalError>,
    },
}

pub type Result<T> = std::result::Result<T, JournalError>;

impl From<sqlx::Error> for JournalError {
    fn from(error: sqlx::Error) -> Self {
        JournalError::Database(error.to_string())
    }
}
