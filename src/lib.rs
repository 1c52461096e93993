//! Sleep-stage aggregation, stage breakdowns and sleep scoring.
//!
//! Raw input (hand-entered hours/minutes or stage intervals from a health
//! source) is reduced to one [`SleepRecord`] per calendar day. Breakdowns and
//! scores are derived from a record on demand and never stored.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod score;
pub mod service;
pub mod source;
pub mod stats;
pub mod store;

pub use aggregate::{aggregate, aggregate_intervals, aggregate_manual, SleepInput};
pub use data::{
    DaySummary, ManualEntry, ScoreColor, SleepRecord, SleepScore, SleepStage, StageBreakdown,
    StageDuration, StageInterval, StageKind,
};
pub use error::{AggregateError, SleepError, SourceError, StoreError};
pub use score::compute_score;
pub use service::{ImportOutcome, SleepService};
pub use stats::compute_breakdown;
