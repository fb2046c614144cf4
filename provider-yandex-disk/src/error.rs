//! Error types for the Yandex Disk provider

use core_sync::AdapterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YandexDiskError {
    /// The access or refresh token was rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Yandex Disk API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, YandexDiskError>;

impl From<YandexDiskError> for AdapterError {
    fn from(error: YandexDiskError) -> Self {
        match error {
            YandexDiskError::AuthenticationFailed(_)
            | YandexDiskError::ApiError {
                status_code: 401 | 403,
                ..
            } => AdapterError::Auth(error.to_string()),
            _ => AdapterError::Io(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_conversion() {
        let forbidden: AdapterError = YandexDiskError::ApiError {
            status_code: 403,
            message: "Forbidden".into(),
        }
        .into();
        assert!(matches!(forbidden, AdapterError::Auth(_)));

        let parse: AdapterError = YandexDiskError::ParseError("eof".into()).into();
        assert_eq!(parse, AdapterError::Io("Failed to parse API response: eof".into()));
    }
}
