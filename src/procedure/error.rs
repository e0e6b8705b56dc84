use thiserror::Error;

use super::types::ProcedureId;
use crate::region_move::MoveError;

/// Errors that can occur while persisting or restoring procedure records
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupted procedure record {path}: {reason}")]
    Corrupted { path: String, reason: String },
}

/// Errors surfaced by the procedure executor
#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("Procedure {0} not found")]
    NotFound(ProcedureId),

    #[error("Child procedure {0} is not pending")]
    UnknownChild(ProcedureId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Move error: {0}")]
    Move(#[from] MoveError),
}
