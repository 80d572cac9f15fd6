//! Engine-level error type.
//!
//! Uncertainty is data in this engine (confidence scores, review queues), so
//! the error surface is small: storage failures, lookups that miss, decisions
//! against already-resolved targets, and config problems. Nothing here is
//! fatal to the surrounding system — batch passes log per-item errors and
//! keep going.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} is already resolved ({status})")]
    AlreadyResolved {
        kind: &'static str,
        id: String,
        status: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn already_resolved(kind: &'static str, id: &str, status: &str) -> Self {
        EngineError::AlreadyResolved {
            kind,
            id: id.to_string(),
            status: status.to_string(),
        }
    }
}
