//! JSON file-backed history store with atomic writes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use shiftbot_common::models::History;
use shiftbot_common::traits::HistoryRepository;

use crate::Error;

pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HistoryRepository for JsonFileHistoryStore {
    async fn load(&self) -> Result<History, Error> {
        if !fs::try_exists(&self.path).await? {
            let history = History::fresh();
            info!(
                "No history at {} => starting fresh with start_time={}",
                self.path.display(),
                history.start_time
            );
            return Ok(history);
        }

        let data = fs::read_to_string(&self.path).await?;
        let history: History = serde_json::from_str(&data)?;
        debug!(
            "Loaded history from {} => {} codes, start_time={}",
            self.path.display(),
            history.announced_codes.len(),
            history.start_time
        );
        Ok(history)
    }

    /// Write to `<file>.tmp`, then rename over the target.
    async fn save(&self, history: &History) -> Result<(), Error> {
        let persist_err = |what: &str, e: std::io::Error| {
            Error::PersistFailed(format!("{what} {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| persist_err("creating directory for", e))?;
        }

        let json = serde_json::to_string_pretty(history)
            .map_err(|e| Error::PersistFailed(format!("serializing history: {e}")))?;
        let tmp = self.tmp_path();

        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| persist_err("writing temp file for", e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| persist_err("replacing", e))?;

        debug!("Saved history => {} codes", history.announced_codes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn missing_file_is_a_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHistoryStore::new(dir.path().join("history.json"));

        let before = Utc::now() - chrono::Duration::seconds(1);
        let history = store.load().await.unwrap();
        assert!(history.announced_codes.is_empty());
        assert!(history.start_time >= before);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.json");
        let store = JsonFileHistoryStore::new(&path);

        let mut history = History::starting_at(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        history.mark_announced("AAAAA-BBBBB");
        store.save(&history).await.unwrap();

        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().await.unwrap(), history);
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileHistoryStore::new(&path).load().await.unwrap_err();
        assert!(err.is_fatal(), "{err:?}");
    }

    #[tokio::test]
    async fn unwritable_target_is_persist_failed() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is an existing directory, so the rename must fail.
        let target = dir.path().join("history.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let store = JsonFileHistoryStore::new(&target);
        let err = store.save(&History::fresh()).await.unwrap_err();
        assert!(matches!(err, Error::PersistFailed(_)), "{err:?}");
    }
}
