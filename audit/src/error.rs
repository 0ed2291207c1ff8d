//! Error taxonomy for audit runs

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// A metric source could not be read. Callers treat the resource as not applicable.
    #[error("{resource} unavailable: {reason}")]
    CollectionUnavailable { resource: String, reason: String },

    /// Structurally impossible readings (used > total). The snapshot is never classified or stored.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("history store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("history store corrupt: {0}")]
    StoreCorrupt(String),

    #[error("history store I/O: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuditError {
    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::CollectionUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures of the persistence layer, as opposed to collection or validation.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::StoreCorrupt(_) | Self::StoreIo(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
