use thiserror::Error;

use crate::types::VersionId;

/// Crate-wide error type for the supervoxel/label equivalence map.
///
/// A "mapping not found" variant is deliberately absent: a supervoxel with
/// no recorded mapping is not an error condition anywhere in this crate, it
/// simply maps to itself.
#[derive(Error, Debug)]
pub enum SvmapError {
    /// The 256-slot short-version space for an instance is exhausted.
    /// Fatal for that instance until restart.
    #[error("version capacity exceeded: instance already has 255 resident versions")]
    VersionCapacityExceeded,

    /// The `VersionGraph` collaborator could not resolve ancestry for a
    /// version. Operations fail cleanly with no partial state.
    #[error("ancestry unavailable for version {0:?}: {1}")]
    AncestryUnavailable(VersionId, String),

    /// A single mutation log record could not be deserialized. Recoverable:
    /// the replayer skips the record and continues.
    #[error("unable to unmarshal log record: {0}")]
    LogUnmarshal(String),

    /// A durable log append failed after the in-memory mutation already
    /// applied. Surfaced to the caller; in-memory state is not rolled back.
    #[error("log append failed for instance {instance}, version {version:?}: {source}")]
    LogAppendFailed {
        instance: String,
        version: VersionId,
        source: String,
    },

    /// Serialization/deserialization failure outside the log-replay path
    /// (e.g. constructing a record to append).
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SvmapError>;
