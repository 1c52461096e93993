//! Sleep score: an ordered threshold cascade over stage durations, then a
//! range-based label and color.

use crate::data::{ScoreColor, SleepRecord, SleepScore};
use crate::stats::hours;

/// One tier of the cascade. Every bound is strict (`>`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRule {
    pub min_deep_hours: f64,
    pub min_rem_hours: f64,
    pub min_total_hours: f64,
    pub score: u8,
}

impl ScoreRule {
    fn matches(&self, deep: f64, rem: f64, total: f64) -> bool {
        deep > self.min_deep_hours && rem > self.min_rem_hours && total > self.min_total_hours
    }
}

/// Evaluated top-down; the first match wins.
pub const SCORE_RULES: [ScoreRule; 4] = [
    ScoreRule { min_deep_hours: 1.5, min_rem_hours: 2.0, min_total_hours: 7.5, score: 100 },
    ScoreRule { min_deep_hours: 0.5, min_rem_hours: 1.0, min_total_hours: 6.5, score: 80 },
    ScoreRule { min_deep_hours: 0.25, min_rem_hours: 0.5, min_total_hours: 5.5, score: 60 },
    ScoreRule { min_deep_hours: 0.0833, min_rem_hours: 0.25, min_total_hours: 4.5, score: 40 },
];

/// Any sleep at all that misses every tier.
pub const ANY_SLEEP_SCORE: u8 = 20;

pub fn compute_score(record: Option<&SleepRecord>) -> SleepScore {
    let score = match record {
        Some(record) => cascade(record),
        None => 0,
    };
    classify(score)
}

fn cascade(record: &SleepRecord) -> u8 {
    let deep = hours(record.deep_sleep_seconds);
    let rem = hours(record.rem_sleep_seconds);
    let total = hours(record.total_sleep_seconds);

    SCORE_RULES
        .iter()
        .find(|rule| rule.matches(deep, rem, total))
        .map(|rule| rule.score)
        .unwrap_or(if total > 0.0 { ANY_SLEEP_SCORE } else { 0 })
}

fn classify(score: u8) -> SleepScore {
    let value = i32::from(score);
    SleepScore {
        score,
        label: label_for(value),
        color: color_for(value),
    }
}

pub fn label_for(score: i32) -> &'static str {
    match score {
        90..=100 => "Excellent",
        70..=89 => "Good",
        50..=69 => "Fair",
        30..=49 => "Poor",
        1..=29 => "Very Poor",
        _ => "No Data",
    }
}

pub fn color_for(score: i32) -> ScoreColor {
    match score {
        90..=100 => ScoreColor::Green,
        70..=89 => ScoreColor::Mint,
        50..=69 => ScoreColor::Yellow,
        30..=49 => ScoreColor::Orange,
        1..=29 => ScoreColor::Red,
        _ => ScoreColor::Gray,
    }
}
