use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::source::{ExportFileSource, HttpSampleSource, SampleSource};
use crate::store::JsonFileStore;

pub const DEFAULT_LOG_FILTER: &str = "flexsleep=info";

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    None,
    ExportFile(PathBuf),
    Http { base_url: String, token: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub source: SourceConfig,
    pub log_filter: String,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("FLEXSLEEP_DATA_DIR").map(PathBuf::from);

        // A local export wins over the relay when both are configured
        let source = if let Some(path) = lookup("FLEXSLEEP_HEALTH_EXPORT") {
            SourceConfig::ExportFile(PathBuf::from(path))
        } else if let Some(base_url) = lookup("FLEXSLEEP_HEALTH_URL") {
            SourceConfig::Http {
                base_url,
                token: lookup("FLEXSLEEP_HEALTH_TOKEN"),
            }
        } else {
            SourceConfig::None
        };

        Config {
            data_dir,
            source,
            log_filter: lookup("FLEXSLEEP_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .context("Failed to get data directory")?
                .join("flexsleep"),
        };

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(dir)
    }

    pub fn open_store(&self) -> Result<JsonFileStore> {
        Ok(JsonFileStore::in_dir(&self.data_dir()?))
    }

    pub fn open_source(&self) -> Result<Option<Arc<dyn SampleSource>>> {
        let source: Arc<dyn SampleSource> = match &self.source {
            SourceConfig::None => return Ok(None),
            SourceConfig::ExportFile(path) => Arc::new(ExportFileSource::new(path.clone())),
            SourceConfig::Http { base_url, token } => Arc::new(
                HttpSampleSource::new(base_url.clone(), token.clone())
                    .context("Failed to set up health relay client")?,
            ),
        };
        Ok(Some(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.source, SourceConfig::None);
        assert_eq!(config.data_dir, None);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn export_wins_over_relay() {
        let config = config(&[
            ("FLEXSLEEP_HEALTH_EXPORT", "/tmp/export.json"),
            ("FLEXSLEEP_HEALTH_URL", "http://localhost:9000"),
        ]);
        assert_eq!(
            config.source,
            SourceConfig::ExportFile(PathBuf::from("/tmp/export.json"))
        );
    }

    #[test]
    fn relay_picks_up_token() {
        let config = config(&[
            ("FLEXSLEEP_HEALTH_URL", "http://localhost:9000"),
            ("FLEXSLEEP_HEALTH_TOKEN", "abc"),
            ("FLEXSLEEP_LOG", "flexsleep=debug"),
        ]);
        assert_eq!(
            config.source,
            SourceConfig::Http {
                base_url: "http://localhost:9000".into(),
                token: Some("abc".into()),
            }
        );
        assert_eq!(config.log_filter, "flexsleep=debug");
    }

    #[test]
    fn data_dir_override_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("flexsleep");
        let config = config(&[("FLEXSLEEP_DATA_DIR", target.to_str().unwrap())]);
        assert_eq!(config.data_dir().unwrap(), target);
        assert!(target.is_dir());
        assert_eq!(
            config.open_store().unwrap().path(),
            target.join(crate::store::RECORDS_FILE)
        );
    }
}
