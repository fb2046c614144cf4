use crate::adapter::AdapterError;
use core_auth::ProviderType;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    #[error("User is not the owner of {entity_type} {id}")]
    NotOwner { entity_type: String, id: String },

    #[error("No adapter registered for provider {0}")]
    NoAdapterFound(ProviderType),

    #[error("{provider} request failed: {message}")]
    AdapterIo {
        provider: ProviderType,
        message: String,
    },

    #[error("{provider} rejected credentials: {message}")]
    AdapterAuth {
        provider: ProviderType,
        message: String,
    },

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Operation {operation} timed out")]
    Timeout { operation: String },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl SyncError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn not_owner(entity_type: &str, id: impl ToString) -> Self {
        Self::NotOwner {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn from_adapter(provider: ProviderType, err: AdapterError) -> Self {
        match err {
            AdapterError::Io(message) => Self::AdapterIo { provider, message },
            AdapterError::Auth(message) => Self::AdapterAuth { provider, message },
        }
    }

    pub(crate) fn commit(err: LibraryError) -> Self {
        Self::Commit(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
