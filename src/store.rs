//! Day-keyed storage of sleep records.
//!
//! At most one record is kept per calendar day; saving a record for a day
//! that already has one replaces it.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::data::SleepRecord;
use crate::error::StoreError;

pub const RECORDS_FILE: &str = "sleep_records.json";

#[async_trait]
pub trait SleepStore: Send + Sync {
    async fn load(&self, date: NaiveDate) -> Result<Option<SleepRecord>, StoreError>;

    /// Store `record`, replacing any record for the same day.
    async fn save(&self, record: &SleepRecord) -> Result<(), StoreError>;

    /// Remove the record for `date`. Returns whether one existed.
    async fn delete(&self, date: NaiveDate) -> Result<bool, StoreError>;

    /// All records, oldest day first.
    async fn list(&self) -> Result<Vec<SleepRecord>, StoreError>;
}

// ── JSON file store ─────────────────────────────────────

/// All records kept as one JSON array in a single file.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(RECORDS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<NaiveDate, SleepRecord>, StoreError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let records: Vec<SleepRecord> =
            serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(records.into_iter().map(|r| (r.date, r)).collect())
    }

    async fn write_all(&self, records: &BTreeMap<NaiveDate, SleepRecord>) -> Result<(), StoreError> {
        let list: Vec<&SleepRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl SleepStore for JsonFileStore {
    async fn load(&self, date: NaiveDate) -> Result<Option<SleepRecord>, StoreError> {
        Ok(self.read_all().await?.remove(&date))
    }

    async fn save(&self, record: &SleepRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        if records.insert(record.date, *record).is_some() {
            tracing::debug!(date = %record.date, "Replacing stored sleep record");
        }
        self.write_all(&records).await?;
        tracing::info!(
            date = %record.date,
            total_seconds = record.total_sleep_seconds,
            "Saved sleep record"
        );
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        if records.remove(&date).is_none() {
            return Ok(false);
        }
        self.write_all(&records).await?;
        tracing::info!(%date, "Deleted sleep record");
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<SleepRecord>, StoreError> {
        Ok(self.read_all().await?.into_values().collect())
    }
}

// ── In-memory store ─────────────────────────────────────

/// Process-local store, handy for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<NaiveDate, SleepRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SleepStore for MemoryStore {
    async fn load(&self, date: NaiveDate) -> Result<Option<SleepRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&date).copied())
    }

    async fn save(&self, record: &SleepRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.date, *record);
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(&date).is_some())
    }

    async fn list(&self) -> Result<Vec<SleepRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.values().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_manual;
    use crate::data::{ManualEntry, StageDuration};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn record(date: NaiveDate, deep_minutes: u32) -> SleepRecord {
        aggregate_manual(
            date,
            &ManualEntry {
                deep: StageDuration::new(0, deep_minutes),
                core: StageDuration::new(5, 0),
                rem: StageDuration::new(1, 0),
            },
        )
    }

    #[tokio::test]
    async fn file_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        assert_eq!(store.load(day(5)).await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_replaces_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        store.save(&record(day(5), 20)).await.unwrap();
        store.save(&record(day(6), 40)).await.unwrap();
        store.save(&record(day(5), 50)).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date, day(5));
        assert_eq!(all[0].deep_sleep_seconds, 50 * 60);
        assert_eq!(all[1].date, day(6));

        let reopened = JsonFileStore::in_dir(dir.path());
        assert_eq!(reopened.load(day(5)).await.unwrap(), Some(record(day(5), 50)));
    }

    #[tokio::test]
    async fn file_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        store.save(&record(day(5), 20)).await.unwrap();

        assert!(store.delete(day(5)).await.unwrap());
        assert!(!store.delete(day(5)).await.unwrap());
        assert_eq!(store.load(day(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.load(day(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(store.save(&record(day(5), 10)).await.is_err());
    }

    #[tokio::test]
    async fn inconsistent_total_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        std::fs::write(
            store.path(),
            r#"[{"date":"2025-05-05","total_sleep_seconds":30000,"deep_sleep_seconds":0,"core_sleep_seconds":600,"rem_sleep_seconds":0}]"#,
        )
        .unwrap();

        let err = store.load(day(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn memory_store_keys_by_day() {
        let store = MemoryStore::new();
        store.save(&record(day(7), 10)).await.unwrap();
        store.save(&record(day(3), 10)).await.unwrap();
        store.save(&record(day(7), 30)).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.iter().map(|r| r.date).collect::<Vec<_>>(), vec![day(3), day(7)]);
        assert_eq!(store.load(day(7)).await.unwrap().unwrap().deep_sleep_seconds, 1800);
        assert!(store.delete(day(3)).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
