use std::fmt;

use agrodesk_core::{CoreError, LeadStage};
use agrodesk_storage::StorageError;
use thiserror::Error;

use crate::export::ExportError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("illegal stage transition: {from} -> {to}")]
    IllegalTransition { from: LeadStage, to: LeadStage },

    #[error("engagement {0} was changed by someone else; reload and try again")]
    ConcurrentModification(String),

    #[error("engagement already closed: {0}")]
    AlreadyClosed(String),

    #[error("engagement is not closed: {0}")]
    NotClosed(String),

    #[error("{field} is not selectable: {reason}")]
    NotSelectable { field: &'static str, reason: String },

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("backend client unavailable: a previous operation panicked")]
    ClientPoisoned,
}

impl EngineError {
    /// Lift storage-level signals into their lifecycle meaning.
    pub(crate) fn from_storage(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { id, .. } => Self::ConcurrentModification(id),
            StorageError::NotFound { table, id } => Self::NotFound(format!("{table} {id}")),
            StorageError::Core(CoreError::IllegalTransition { from, to }) => {
                Self::IllegalTransition { from, to }
            }
            other => Self::Storage(other),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.code(),
            Self::Core(CoreError::Validation { .. }) => "validation",
            Self::Core(CoreError::IllegalTransition { .. }) | Self::IllegalTransition { .. } => {
                "illegal_transition"
            }
            Self::Core(_) => "invalid_data",
            Self::NotFound(_) => "not_found",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::AlreadyClosed(_) => "already_closed",
            Self::NotClosed(_) => "not_closed",
            Self::NotSelectable { .. } => "validation",
            Self::Export(ExportError::NoData) => "no_data",
            Self::Export(_) => "export",
            Self::ClientPoisoned => "unavailable",
        }
    }
}

/// The `{message, code, details}` shape presentation code renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub message: String,
    pub code: String,
    pub details: Option<String>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }
}

impl From<&EngineError> for ServiceError {
    fn from(err: &EngineError) -> Self {
        let details = match err {
            EngineError::Storage(StorageError::Sqlite(inner)) => Some(inner.to_string()),
            EngineError::Storage(StorageError::ConstraintViolation(detail)) => Some(detail.clone()),
            _ => None,
        };
        let message = match err {
            EngineError::Storage(StorageError::ConstraintViolation(_)) => {
                "The record conflicts with existing data or is still referenced".to_string()
            }
            EngineError::Storage(StorageError::Sqlite(_)) => "The database request failed".to_string(),
            other => other.to_string(),
        };
        Self {
            message,
            code: err.code().to_string(),
            details,
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ServiceError {}
