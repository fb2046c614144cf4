use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Duplicate {entity_type}: {key}")]
    Duplicate { entity_type: String, key: String },
}

impl LibraryError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Map a unique-constraint violation to `Duplicate`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, entity_type: &str, key: impl ToString) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate {
                entity_type: entity_type.to_string(),
                key: key.to_string(),
            },
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
