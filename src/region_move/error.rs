use thiserror::Error;

use crate::cluster::{ServerName, TableName};

/// Whether the caller may retry the operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    DoNotRetry,
}

/// Errors raised while building, checking or restoring a region move
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Cluster unavailable: {reason}")]
    ClusterUnavailable { reason: String },

    #[error("Table {0} is disabled")]
    TableDisabled(TableName),

    #[error("Table {0} does not exist")]
    TableNotFound(TableName),

    #[error("Region {region} is not online")]
    RegionOffline { region: String },

    #[error("Region {region} is unknown to the region registry")]
    RegionUnknown { region: String },

    #[error("Source server {0} is not online")]
    SourceOffline(ServerName),

    #[error("Unhandled state id {0}")]
    UnknownState(i32),

    #[error("Invalid persisted state data: {0}")]
    InvalidStateData(#[from] serde_json::Error),
}

impl MoveError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            MoveError::ClusterUnavailable { .. }
            | MoveError::TableDisabled(_)
            | MoveError::TableNotFound(_) => ErrorClass::Retryable,
            MoveError::SourceOffline(_)
            | MoveError::RegionOffline { .. }
            | MoveError::RegionUnknown { .. }
            | MoveError::UnknownState(_)
            | MoveError::InvalidStateData(_) => ErrorClass::DoNotRetry,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classification() == ErrorClass::Retryable
    }
}
