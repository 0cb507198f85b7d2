//! Error taxonomy for the indexing pipeline.
//!
//! Single-statement failures (`UnknownClass`, `TypeMismatch`, the two
//! constraint variants) are meant to be logged and swallowed by the batch
//! they occurred in; callers should match on them rather than bubble them
//! all the way to the orchestrator. `StoreBusy` is retried by the update
//! buffer's commit path. Everything else is a hard stop for the current
//! unit of work (a file, a miner run).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("type mismatch for property {property}: expected {expected}, got {actual}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("constraint: subject {subject} is not in domain of {property}")]
    ConstraintDomain { subject: String, property: String },

    #[error("constraint: multiple values for single-valued property {0}")]
    ConstraintCardinality(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("uri already in use: {0}")]
    UriTaken(String),

    #[error("extractor failed for {path}: {reason}")]
    ExtractorFailed { path: PathBuf, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("store busy, retry")]
    StoreBusy,

    #[error("ontology error: {0}")]
    Ontology(String),

    #[error("shutdown in progress")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    /// Whether this error represents a single-statement failure that should
    /// be logged, with the surrounding batch continuing past it.
    pub fn is_statement_local(&self) -> bool {
        matches!(
            self,
            TrackerError::UnknownClass(_)
                | TrackerError::UnknownProperty(_)
                | TrackerError::TypeMismatch { .. }
                | TrackerError::ConstraintDomain { .. }
                | TrackerError::ConstraintCardinality(_)
        )
    }
}
