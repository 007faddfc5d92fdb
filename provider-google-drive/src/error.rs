//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Template copy could not be filled in and the copy could not be removed
    #[error("Failed to fill in document {document_id} ({cause}); cleanup also failed: {cleanup}")]
    CleanupFailed {
        document_id: String,
        cause: String,
        cleanup: String,
    },

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 400,
            message: "Invalid query".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 400): Invalid query"
        );
    }

    #[test]
    fn test_error_conversion() {
        let error = GoogleDriveError::AuthenticationFailed("Token expired".to_string());
        let bridge_error: BridgeError = error.into();

        assert!(matches!(bridge_error, BridgeError::OperationFailed(_)));
    }

    #[test]
    fn test_not_found_conversion() {
        let error = GoogleDriveError::FileNotFound {
            file_id: "abc".to_string(),
        };
        let bridge_error: BridgeError = error.into();

        assert!(matches!(bridge_error, BridgeError::NotFound(id) if id == "abc"));
    }
}
