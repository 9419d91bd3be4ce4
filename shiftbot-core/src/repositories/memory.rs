use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use shiftbot_common::models::History;
use shiftbot_common::traits::HistoryRepository;

use crate::Error;

/// Keeps history in process memory. Used by `--dry-run` and by tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    stored: Mutex<Option<History>>,
    saves: AtomicUsize,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: History) -> Self {
        Self {
            stored: Mutex::new(Some(history)),
            saves: AtomicUsize::new(0),
        }
    }

    /// What the last successful `save` wrote, if anything.
    pub async fn snapshot(&self) -> Option<History> {
        self.stored.lock().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryRepository for MemoryHistoryStore {
    async fn load(&self) -> Result<History, Error> {
        Ok(self.stored.lock().await.clone().unwrap_or_else(History::fresh))
    }

    async fn save(&self, history: &History) -> Result<(), Error> {
        *self.stored.lock().await = Some(history.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
