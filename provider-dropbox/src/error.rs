//! Error types for the Dropbox provider

use core_sync::AdapterError;
use thiserror::Error;

/// Dropbox provider errors
#[derive(Error, Debug)]
pub enum DropboxError {
    /// The access or refresh token was rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned a non-success status
    #[error("Dropbox API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for Dropbox operations
pub type Result<T> = std::result::Result<T, DropboxError>;

impl DropboxError {
    /// Whether the failure means the credentials are no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            DropboxError::AuthenticationFailed(_) => true,
            DropboxError::ApiError { status_code, .. } => matches!(status_code, 401 | 403),
            _ => false,
        }
    }
}

impl From<DropboxError> for AdapterError {
    fn from(error: DropboxError) -> Self {
        if error.is_auth_failure() {
            AdapterError::Auth(error.to_string())
        } else {
            AdapterError::Io(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;

    #[test]
    fn test_error_display() {
        let error = DropboxError::ApiError {
            status_code: 409,
            message: "path/not_found/".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Dropbox API error (status 409): path/not_found/"
        );
    }

    #[test]
    fn test_adapter_error_conversion() {
        let auth: AdapterError = DropboxError::AuthenticationFailed("expired".into()).into();
        assert!(matches!(auth, AdapterError::Auth(_)));

        let forbidden: AdapterError = DropboxError::ApiError {
            status_code: 403,
            message: "forbidden".into(),
        }
        .into();
        assert!(matches!(forbidden, AdapterError::Auth(_)));

        let server: AdapterError = DropboxError::ApiError {
            status_code: 503,
            message: "unavailable".into(),
        }
        .into();
        assert!(matches!(server, AdapterError::Io(_)));

        let transport: AdapterError =
            DropboxError::from(BridgeError::OperationFailed("reset".into())).into();
        assert!(matches!(transport, AdapterError::Io(_)));
    }
}
