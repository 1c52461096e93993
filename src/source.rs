//! Where raw sleep-stage intervals come from: an exported health-data file or
//! an HTTP relay in front of a health-data provider.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregate::group_by_day;
use crate::data::{StageInterval, StageKind};
use crate::error::SourceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SAMPLES_ENDPOINT: &str = "/sleep/samples";

#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Intervals whose start falls on `date`, ordered by start time. An empty
    /// list means the source has nothing for that day.
    async fn fetch_stage_intervals(&self, date: NaiveDate) -> Result<Vec<StageInterval>, SourceError>;

    fn name(&self) -> &'static str;
}

// ── Wire format ─────────────────────────────────────────

/// One sleep-analysis sample as a health provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub value: i64,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
}

impl From<&HealthSample> for StageInterval {
    fn from(sample: &HealthSample) -> Self {
        StageInterval::new(
            StageKind::from_health_value(sample.value),
            sample.start_date,
            sample.end_date,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleBatch {
    #[serde(default)]
    pub samples: Vec<HealthSample>,
}

impl SampleBatch {
    fn intervals_on(&self, date: NaiveDate) -> Vec<StageInterval> {
        let intervals: Vec<StageInterval> = self.samples.iter().map(StageInterval::from).collect();
        let mut day = group_by_day(&intervals).remove(&date).unwrap_or_default();
        day.sort_by_key(|i| i.start);
        day
    }
}

// ── Export file ─────────────────────────────────────────

pub struct ExportFileSource {
    path: PathBuf,
}

impl ExportFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_batch(&self) -> Result<SampleBatch, SourceError> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    SourceError::PermissionDenied(format!("{}: {}", self.path.display(), e))
                }
                _ => SourceError::SourceUnavailable(format!("{}: {}", self.path.display(), e)),
            })?;

        serde_json::from_str(&json).map_err(|e| {
            SourceError::SourceUnavailable(format!(
                "Malformed health export {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl SampleSource for ExportFileSource {
    async fn fetch_stage_intervals(&self, date: NaiveDate) -> Result<Vec<StageInterval>, SourceError> {
        let batch = self.read_batch().await?;
        let intervals = batch.intervals_on(date);
        tracing::debug!(
            %date,
            path = %self.path.display(),
            samples = batch.samples.len(),
            matched = intervals.len(),
            "Read health export"
        );
        Ok(intervals)
    }

    fn name(&self) -> &'static str {
        "health export"
    }
}

// ── HTTP relay ──────────────────────────────────────────

pub struct HttpSampleSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSampleSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::SourceUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn check_response(&self, response: reqwest::Response) -> Result<String, SourceError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::PermissionDenied(format!(
                "{} returned {}",
                SAMPLES_ENDPOINT, status
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                "Empty response".to_string()
            } else {
                body.chars().take(200).collect::<String>()
            };
            return Err(SourceError::SourceUnavailable(format!(
                "{} returned {} - {}",
                SAMPLES_ENDPOINT, status, message
            )));
        }

        response.text().await.map_err(|e| {
            SourceError::SourceUnavailable(format!("Failed to read response body: {}", e))
        })
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch_stage_intervals(&self, date: NaiveDate) -> Result<Vec<StageInterval>, SourceError> {
        let url = format!(
            "{}{}?date={}",
            self.base_url,
            SAMPLES_ENDPOINT,
            date.format("%Y-%m-%d")
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            SourceError::SourceUnavailable(format!("Request to {} failed: {}", SAMPLES_ENDPOINT, e))
        })?;

        let body = self.check_response(response).await?;
        let batch: SampleBatch = serde_json::from_str(&body).map_err(|e| {
            SourceError::SourceUnavailable(format!(
                "Failed to parse {} response: {} (body excerpt: {})",
                SAMPLES_ENDPOINT,
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        Ok(batch.intervals_on(date))
    }

    fn name(&self) -> &'static str {
        "health relay"
    }
}
