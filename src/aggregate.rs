//! Stage aggregation: turn manual hours/minutes or raw stage intervals into a
//! [`SleepRecord`].
//!
//! Everything here is pure. Persisting the result is the caller's job.

use chrono::{NaiveDate, TimeDelta};
use std::collections::BTreeMap;

use crate::data::{ManualEntry, SleepRecord, StageInterval, StageKind};
use crate::error::AggregateError;

/// The two input shapes a record can be built from.
#[derive(Debug, Clone, PartialEq)]
pub enum SleepInput {
    Manual(ManualEntry),
    Intervals(Vec<StageInterval>),
}

pub fn aggregate(date: NaiveDate, input: &SleepInput) -> Result<SleepRecord, AggregateError> {
    match input {
        SleepInput::Manual(entry) => Ok(aggregate_manual(date, entry)),
        SleepInput::Intervals(intervals) => aggregate_intervals(date, intervals),
    }
}

pub fn aggregate_manual(date: NaiveDate, entry: &ManualEntry) -> SleepRecord {
    SleepRecord::from_stages(
        date,
        entry.deep.seconds(),
        entry.core.seconds(),
        entry.rem.seconds(),
    )
}

/// Sum interval durations per stage. Fails on the first interval whose end
/// precedes its start.
pub fn aggregate_intervals(
    date: NaiveDate,
    intervals: &[StageInterval],
) -> Result<SleepRecord, AggregateError> {
    let mut totals = StageTotals::default();
    for interval in intervals {
        totals.add(interval)?;
    }
    Ok(totals.into_record(date))
}

/// Like [`aggregate_intervals`], but drops invalid intervals instead of
/// failing. Returns the record and how many intervals were dropped.
pub fn aggregate_intervals_lenient(
    date: NaiveDate,
    intervals: &[StageInterval],
) -> (SleepRecord, usize) {
    let mut totals = StageTotals::default();
    let mut skipped = 0;
    for interval in intervals {
        if let Err(err) = totals.add(interval) {
            tracing::warn!(%date, error = %err, "Skipping sleep interval");
            skipped += 1;
        }
    }
    (totals.into_record(date), skipped)
}

/// Bucket intervals by the calendar day their start falls on, keeping the
/// original order inside each day.
pub fn group_by_day(intervals: &[StageInterval]) -> BTreeMap<NaiveDate, Vec<StageInterval>> {
    let mut days: BTreeMap<NaiveDate, Vec<StageInterval>> = BTreeMap::new();
    for interval in intervals {
        days.entry(interval.day()).or_default().push(interval.clone());
    }
    days
}

struct StageTotals {
    deep: TimeDelta,
    core: TimeDelta,
    rem: TimeDelta,
}

impl Default for StageTotals {
    fn default() -> Self {
        Self {
            deep: TimeDelta::zero(),
            core: TimeDelta::zero(),
            rem: TimeDelta::zero(),
        }
    }
}

impl StageTotals {
    fn add(&mut self, interval: &StageInterval) -> Result<(), AggregateError> {
        let duration = interval.end - interval.start;
        if duration < TimeDelta::zero() {
            return Err(AggregateError::InvalidInterval {
                kind: interval.kind,
                start: interval.start,
                end: interval.end,
            });
        }
        if duration.is_zero() {
            return Ok(());
        }

        let slot = match interval.kind {
            StageKind::Deep => &mut self.deep,
            StageKind::Core => &mut self.core,
            StageKind::Rem => &mut self.rem,
            StageKind::Other => return Ok(()),
        };
        *slot = *slot + duration;
        Ok(())
    }

    fn into_record(self, date: NaiveDate) -> SleepRecord {
        SleepRecord::from_stages(
            date,
            whole_seconds(self.deep),
            whole_seconds(self.core),
            whole_seconds(self.rem),
        )
    }
}

fn whole_seconds(delta: TimeDelta) -> u64 {
    u64::try_from(delta.num_seconds()).unwrap_or(0)
}
