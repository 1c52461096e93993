use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SECONDS_PER_HOUR: u64 = 3600;
pub const SECONDS_PER_MINUTE: u64 = 60;

// ── Stages ──────────────────────────────────────────────

/// A scored sleep stage. Breakdowns are always emitted in `SleepStage::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStage {
    Deep,
    Core,
    Rem,
}

impl SleepStage {
    pub const ALL: [SleepStage; 3] = [SleepStage::Deep, SleepStage::Core, SleepStage::Rem];

    pub fn display_name(self) -> &'static str {
        match self {
            SleepStage::Deep => "Deep Sleep",
            SleepStage::Core => "Core Sleep",
            SleepStage::Rem => "REM Sleep",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SleepStage::Deep => {
                "Deep sleep is crucial for physical recovery and memory consolidation."
            }
            SleepStage::Core => {
                "Core sleep is the light sleep stage where your body starts to relax."
            }
            SleepStage::Rem => "REM sleep is important for cognitive functions and dreaming.",
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Stage tag carried by a raw interval. Everything a health source reports
/// that is not deep/core/REM (in bed, awake, unspecified) lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Deep,
    Core,
    Rem,
    Other,
}

impl StageKind {
    /// Map a health-provider sleep-analysis category code.
    ///
    /// 0 in bed, 1 asleep (unspecified), 2 awake, 3 core, 4 deep, 5 REM.
    pub fn from_health_value(value: i64) -> Self {
        match value {
            3 => StageKind::Core,
            4 => StageKind::Deep,
            5 => StageKind::Rem,
            _ => StageKind::Other,
        }
    }

    pub fn stage(self) -> Option<SleepStage> {
        match self {
            StageKind::Deep => Some(SleepStage::Deep),
            StageKind::Core => Some(SleepStage::Core),
            StageKind::Rem => Some(SleepStage::Rem),
            StageKind::Other => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self.stage() {
            Some(stage) => stage.display_name(),
            None => "Other",
        }
    }
}

impl From<SleepStage> for StageKind {
    fn from(stage: SleepStage) -> Self {
        match stage {
            SleepStage::Deep => StageKind::Deep,
            SleepStage::Core => StageKind::Core,
            SleepStage::Rem => StageKind::Rem,
        }
    }
}

// ── Raw input ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInterval {
    pub kind: StageKind,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl StageInterval {
    pub fn new(kind: StageKind, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { kind, start, end }
    }

    /// Calendar day the interval is attributed to, in its own UTC offset.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDuration {
    pub hours: u32,
    pub minutes: u32,
}

impl StageDuration {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    pub fn seconds(&self) -> u64 {
        u64::from(self.hours) * SECONDS_PER_HOUR + u64::from(self.minutes) * SECONDS_PER_MINUTE
    }

    /// Whole hours and minutes; leftover seconds are dropped.
    pub fn from_seconds(seconds: u64) -> Self {
        let total_minutes = seconds / SECONDS_PER_MINUTE;
        Self {
            hours: u32::try_from(total_minutes / 60).unwrap_or(u32::MAX),
            minutes: (total_minutes % 60) as u32,
        }
    }
}

/// Hours/minutes typed in by hand for each scored stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub deep: StageDuration,
    pub core: StageDuration,
    pub rem: StageDuration,
}

impl ManualEntry {
    pub fn from_record(record: &SleepRecord) -> Self {
        Self {
            deep: StageDuration::from_seconds(record.deep_sleep_seconds),
            core: StageDuration::from_seconds(record.core_sleep_seconds),
            rem: StageDuration::from_seconds(record.rem_sleep_seconds),
        }
    }
}

// ── Sleep record ────────────────────────────────────────

/// One calendar day's sleep summary.
///
/// The total is always the sum of the three stages. Build records with
/// [`SleepRecord::from_stages`]; decoding rejects a stored total that
/// disagrees with its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord")]
pub struct SleepRecord {
    pub date: NaiveDate,
    pub total_sleep_seconds: u64,
    pub deep_sleep_seconds: u64,
    pub core_sleep_seconds: u64,
    pub rem_sleep_seconds: u64,
}

impl SleepRecord {
    pub fn from_stages(date: NaiveDate, deep: u64, core: u64, rem: u64) -> Self {
        Self {
            date,
            total_sleep_seconds: deep.saturating_add(core).saturating_add(rem),
            deep_sleep_seconds: deep,
            core_sleep_seconds: core,
            rem_sleep_seconds: rem,
        }
    }

    pub fn stage_seconds(&self, stage: SleepStage) -> u64 {
        match stage {
            SleepStage::Deep => self.deep_sleep_seconds,
            SleepStage::Core => self.core_sleep_seconds,
            SleepStage::Rem => self.rem_sleep_seconds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_sleep_seconds == 0
    }
}

#[derive(Deserialize)]
struct StoredRecord {
    date: NaiveDate,
    total_sleep_seconds: u64,
    deep_sleep_seconds: u64,
    core_sleep_seconds: u64,
    rem_sleep_seconds: u64,
}

impl TryFrom<StoredRecord> for SleepRecord {
    type Error = String;

    fn try_from(raw: StoredRecord) -> Result<Self, Self::Error> {
        let record = SleepRecord::from_stages(
            raw.date,
            raw.deep_sleep_seconds,
            raw.core_sleep_seconds,
            raw.rem_sleep_seconds,
        );
        if record.total_sleep_seconds != raw.total_sleep_seconds {
            return Err(format!(
                "record for {} has total {}s but its stages sum to {}s",
                raw.date, raw.total_sleep_seconds, record.total_sleep_seconds
            ));
        }
        Ok(record)
    }
}

// ── Derived views ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageBreakdown {
    pub stage: SleepStage,
    pub duration_seconds: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreColor {
    Gray,
    Red,
    Orange,
    Yellow,
    Mint,
    Green,
}

impl ScoreColor {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreColor::Gray => "gray",
            ScoreColor::Red => "red",
            ScoreColor::Orange => "orange",
            ScoreColor::Yellow => "yellow",
            ScoreColor::Mint => "mint",
            ScoreColor::Green => "green",
        }
    }
}

impl fmt::Display for ScoreColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SleepScore {
    pub score: u8,
    pub label: &'static str,
    pub color: ScoreColor,
}

// ── Day summary ─────────────────────────────────────────

/// Everything the presentation layer shows for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub record: Option<SleepRecord>,
    pub breakdown: Vec<StageBreakdown>,
    pub score: SleepScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_values_collapse_non_sleep_categories() {
        assert_eq!(StageKind::from_health_value(0), StageKind::Other);
        assert_eq!(StageKind::from_health_value(1), StageKind::Other);
        assert_eq!(StageKind::from_health_value(2), StageKind::Other);
        assert_eq!(StageKind::from_health_value(3), StageKind::Core);
        assert_eq!(StageKind::from_health_value(4), StageKind::Deep);
        assert_eq!(StageKind::from_health_value(5), StageKind::Rem);
        assert_eq!(StageKind::from_health_value(42), StageKind::Other);
        assert_eq!(StageKind::Other.stage(), None);
    }

    #[test]
    fn stage_duration_round_trips_whole_minutes() {
        let d = StageDuration::from_seconds(5459);
        assert_eq!(d, StageDuration::new(1, 30));
        assert_eq!(d.seconds(), 5400);
    }

    #[test]
    fn manual_entry_from_record_splits_each_stage() {
        let record = SleepRecord::from_stages(
            NaiveDate::from_ymd_opt(2025, 5, 5).unwrap(),
            1800,
            14400,
            5400,
        );
        let entry = ManualEntry::from_record(&record);
        assert_eq!(entry.deep, StageDuration::new(0, 30));
        assert_eq!(entry.core, StageDuration::new(4, 0));
        assert_eq!(entry.rem, StageDuration::new(1, 30));
    }

    #[test]
    fn stage_kind_display_names() {
        assert_eq!(StageKind::Deep.display_name(), SleepStage::Deep.display_name());
        assert_eq!(StageKind::Core.display_name(), SleepStage::Core.display_name());
        assert_eq!(StageKind::Rem.display_name(), SleepStage::Rem.display_name());
        assert_eq!(StageKind::Other.display_name(), "Other");
    }

    #[test]
    fn record_decoding_checks_the_total() {
        let ok = r#"{"date":"2025-05-05","total_sleep_seconds":900,"deep_sleep_seconds":300,"core_sleep_seconds":500,"rem_sleep_seconds":100}"#;
        let record: SleepRecord = serde_json::from_str(ok).unwrap();
        assert_eq!(record.total_sleep_seconds, 900);

        let bad = r#"{"date":"2025-05-05","total_sleep_seconds":30000,"deep_sleep_seconds":0,"core_sleep_seconds":600,"rem_sleep_seconds":0}"#;
        assert!(serde_json::from_str::<SleepRecord>(bad).is_err());
    }

    #[test]
    fn stage_serializes_lowercase() {
        let json = serde_json::to_string(&SleepStage::Rem).unwrap();
        assert_eq!(json, "\"rem\"");
        let kind: StageKind = serde_json::from_str("\"other\"").unwrap();
        assert_eq!(kind, StageKind::Other);
    }
}
