use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;

use crate::data::StageKind;

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("Invalid {kind:?} interval: end {end} precedes start {start}")]
    InvalidInterval {
        kind: StageKind,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

/// Failures reported by a sample source. The core passes these through untouched.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Sleep sample source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Permission denied reading sleep samples: {0}")]
    PermissionDenied(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access sleep store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Sleep store at {path} could not be decoded: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode sleep records: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SleepError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No sleep sample source configured")]
    NoSource,
}

pub type SleepResult<T> = Result<T, SleepError>;
