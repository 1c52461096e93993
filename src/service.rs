use chrono::{Days, NaiveDate};
use std::sync::Arc;

use crate::aggregate::{aggregate_intervals, aggregate_manual};
use crate::data::{DaySummary, ManualEntry, SleepRecord};
use crate::error::{SleepError, SleepResult};
use crate::score::compute_score;
use crate::source::SampleSource;
use crate::stats::breakdown_for_day;
use crate::store::SleepStore;

/// Result of pulling one day from the sample source.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Imported(SleepRecord),
    NoData,
}

/// Ties storage and an optional sample source to the derivation pipeline.
/// Both collaborators are handed in by the caller.
pub struct SleepService {
    store: Arc<dyn SleepStore>,
    source: Option<Arc<dyn SampleSource>>,
}

impl SleepService {
    pub fn new(store: Arc<dyn SleepStore>, source: Option<Arc<dyn SampleSource>>) -> Self {
        Self { store, source }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn summarize(date: NaiveDate, record: Option<SleepRecord>) -> DaySummary {
        DaySummary {
            date,
            breakdown: breakdown_for_day(record.as_ref()),
            score: compute_score(record.as_ref()),
            record,
        }
    }

    pub async fn load_day(&self, date: NaiveDate) -> SleepResult<DaySummary> {
        let record = self.store.load(date).await?;
        Ok(Self::summarize(date, record))
    }

    pub async fn log_manual(&self, date: NaiveDate, entry: &ManualEntry) -> SleepResult<DaySummary> {
        let record = aggregate_manual(date, entry);
        self.store.save(&record).await?;
        Ok(Self::summarize(date, Some(record)))
    }

    /// Fetch, aggregate and save one day. Nothing is written when the source
    /// has no samples for the day.
    pub async fn import(&self, date: NaiveDate) -> SleepResult<ImportOutcome> {
        let source = self.source.as_ref().ok_or(SleepError::NoSource)?;

        let intervals = source.fetch_stage_intervals(date).await.map_err(|e| {
            tracing::warn!(%date, source = source.name(), error = %e, "Sleep sample fetch failed");
            e
        })?;

        if intervals.is_empty() {
            tracing::info!(%date, source = source.name(), "No sleep samples for day");
            return Ok(ImportOutcome::NoData);
        }

        let record = aggregate_intervals(date, &intervals)?;
        self.store.save(&record).await?;
        tracing::info!(
            %date,
            source = source.name(),
            intervals = intervals.len(),
            total_seconds = record.total_sleep_seconds,
            "Imported sleep record"
        );
        Ok(ImportOutcome::Imported(record))
    }

    /// Import each of the `days` days ending on `end`, oldest first. A failed
    /// day does not stop the others.
    pub async fn import_range(
        &self,
        end: NaiveDate,
        days: u32,
    ) -> Vec<(NaiveDate, SleepResult<ImportOutcome>)> {
        let mut results = Vec::new();
        for date in window(end, days) {
            results.push((date, self.import(date).await));
        }
        results
    }

    pub async fn delete(&self, date: NaiveDate) -> SleepResult<bool> {
        Ok(self.store.delete(date).await?)
    }

    /// One summary per day for the `days` days ending on `end`, oldest first.
    /// Days without a record come back as "No Data".
    pub async fn history(&self, end: NaiveDate, days: u32) -> SleepResult<Vec<DaySummary>> {
        let mut summaries = Vec::new();
        for date in window(end, days) {
            summaries.push(self.load_day(date).await?);
        }
        Ok(summaries)
    }

    pub async fn all_records(&self) -> SleepResult<Vec<SleepRecord>> {
        Ok(self.store.list().await?)
    }
}

fn window(end: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .filter_map(|back| end.checked_sub_days(Days::new(u64::from(back))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ScoreColor, SleepStage, StageDuration, StageInterval, StageKind};
    use crate::error::SourceError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;

    struct FixedSource(Result<Vec<StageInterval>, fn() -> SourceError>);

    #[async_trait]
    impl SampleSource for FixedSource {
        async fn fetch_stage_intervals(
            &self,
            _date: NaiveDate,
        ) -> Result<Vec<StageInterval>, SourceError> {
            match &self.0 {
                Ok(intervals) => Ok(intervals.clone()),
                Err(make) => Err(make()),
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn interval(kind: StageKind, start: &str, end: &str) -> StageInterval {
        StageInterval::new(
            kind,
            DateTime::parse_from_rfc3339(start).unwrap(),
            DateTime::parse_from_rfc3339(end).unwrap(),
        )
    }

    fn service(source: Option<FixedSource>) -> (SleepService, MemoryStore) {
        let store = MemoryStore::new();
        let source = source.map(|s| Arc::new(s) as Arc<dyn SampleSource>);
        (SleepService::new(Arc::new(store.clone()), source), store)
    }

    #[tokio::test]
    async fn missing_day_is_no_data() {
        let (svc, _) = service(None);
        let summary = svc.load_day(day(5)).await.unwrap();
        assert_eq!(summary.record, None);
        assert!(summary.breakdown.is_empty());
        assert_eq!(summary.score.score, 0);
        assert_eq!(summary.score.color, ScoreColor::Gray);
    }

    #[tokio::test]
    async fn manual_log_is_saved_and_scored() {
        let (svc, store) = service(None);
        let entry = ManualEntry {
            deep: StageDuration::new(0, 30),
            core: StageDuration::new(4, 0),
            rem: StageDuration::new(1, 30),
        };
        let summary = svc.log_manual(day(5), &entry).await.unwrap();
        assert_eq!(summary.score.score, 60);
        assert_eq!(summary.breakdown.len(), 3);
        assert_eq!(summary.breakdown[1].stage, SleepStage::Core);

        let stored = store.load(day(5)).await.unwrap().unwrap();
        assert_eq!(stored.total_sleep_seconds, 21600);
        assert_eq!(svc.load_day(day(5)).await.unwrap(), summary);
    }

    #[tokio::test]
    async fn import_saves_aggregated_record() {
        let source = FixedSource(Ok(vec![
            interval(StageKind::Core, "2025-05-05T22:00:00Z", "2025-05-06T02:00:00Z"),
            interval(StageKind::Deep, "2025-05-06T02:00:00Z", "2025-05-06T03:00:00Z"),
            interval(StageKind::Other, "2025-05-06T03:00:00Z", "2025-05-06T03:30:00Z"),
            interval(StageKind::Rem, "2025-05-06T03:30:00Z", "2025-05-06T05:00:00Z"),
        ]));
        let (svc, store) = service(Some(source));

        let outcome = svc.import(day(5)).await.unwrap();
        let ImportOutcome::Imported(record) = outcome else {
            panic!("expected an imported record");
        };
        assert_eq!(record.total_sleep_seconds, 6 * 3600 + 30 * 60);
        assert_eq!(store.load(day(5)).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn empty_import_saves_nothing() {
        let (svc, store) = service(Some(FixedSource(Ok(Vec::new()))));
        assert_eq!(svc.import(day(5)).await.unwrap(), ImportOutcome::NoData);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn source_errors_pass_through() {
        fn denied() -> SourceError {
            SourceError::PermissionDenied("not authorized".into())
        }
        let (svc, _) = service(Some(FixedSource(Err(denied))));
        let err = svc.import(day(5)).await.unwrap_err();
        assert!(matches!(err, SleepError::Source(SourceError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn invalid_interval_aborts_import() {
        let source = FixedSource(Ok(vec![interval(
            StageKind::Deep,
            "2025-05-06T03:00:00Z",
            "2025-05-06T02:00:00Z",
        )]));
        let (svc, store) = service(Some(source));
        let err = svc.import(day(5)).await.unwrap_err();
        assert!(matches!(err, SleepError::Aggregate(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_without_source() {
        let (svc, _) = service(None);
        assert!(matches!(svc.import(day(5)).await, Err(SleepError::NoSource)));
    }

    #[tokio::test]
    async fn history_fills_missing_days() {
        let (svc, _) = service(None);
        let entry = ManualEntry {
            core: StageDuration::new(6, 0),
            ..ManualEntry::default()
        };
        svc.log_manual(day(4), &entry).await.unwrap();

        let history = svc.history(day(6), 3).await.unwrap();
        let dates: Vec<_> = history.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(4), day(5), day(6)]);
        assert_eq!(history[0].score.score, 20);
        assert_eq!(history[1].score.label, "No Data");
    }

    #[tokio::test]
    async fn import_range_covers_each_day() {
        let source = FixedSource(Ok(vec![interval(
            StageKind::Core,
            "2025-05-05T22:00:00Z",
            "2025-05-06T02:00:00Z",
        )]));
        let (svc, store) = service(Some(source));
        let results = svc.import_range(day(7), 3).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_removes_day() {
        let (svc, _) = service(None);
        svc.log_manual(day(5), &ManualEntry::default()).await.unwrap();
        assert!(svc.delete(day(5)).await.unwrap());
        assert!(svc.all_records().await.unwrap().is_empty());
    }
}
