use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {table} {id}")]
    NotFound { table: &'static str, id: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("version conflict on {table} {id}: expected version {expected}")]
    VersionConflict {
        table: &'static str,
        id: String,
        expected: i64,
    },

    #[error("core error: {0}")]
    Core(#[from] agrodesk_core::CoreError),
}

impl StorageError {
    /// Classify a rusqlite failure, lifting constraint violations out of the
    /// generic sqlite bucket.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, ref message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            other => Self::Sqlite(other),
        }
    }

    /// Stable machine-readable code, surfaced alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "database",
            Self::Serialization(_) => "serialization",
            Self::NotFound { .. } => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::VersionConflict { .. } => "concurrent_modification",
            Self::Core(agrodesk_core::CoreError::Validation { .. }) => "validation",
            Self::Core(agrodesk_core::CoreError::IllegalTransition { .. }) => "illegal_transition",
            Self::Core(_) => "invalid_data",
        }
    }
}
