use crate::data::{SleepRecord, SleepStage, StageBreakdown, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};

/// Per-stage share of total sleep, in deep/core/REM order.
///
/// Stages with no recorded time are left out, and a record with no sleep at
/// all yields an empty list. Percentages are raw; rounding is up to the caller.
pub fn compute_breakdown(record: &SleepRecord) -> Vec<StageBreakdown> {
    if record.total_sleep_seconds == 0 {
        return Vec::new();
    }

    let total = record.total_sleep_seconds as f64;
    SleepStage::ALL
        .iter()
        .filter_map(|&stage| {
            let duration_seconds = record.stage_seconds(stage);
            (duration_seconds > 0).then(|| StageBreakdown {
                stage,
                duration_seconds,
                percentage: duration_seconds as f64 / total * 100.0,
            })
        })
        .collect()
}

/// Breakdown for a day that may have no record.
pub fn breakdown_for_day(record: Option<&SleepRecord>) -> Vec<StageBreakdown> {
    match record {
        Some(record) => compute_breakdown(record),
        None => Vec::new(),
    }
}

pub fn format_duration(seconds: u64) -> String {
    let minutes = seconds / SECONDS_PER_MINUTE;
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{:.0}%", percentage)
}

pub fn hours(seconds: u64) -> f64 {
    seconds as f64 / SECONDS_PER_HOUR as f64
}
