use async_trait::async_trait;

use crate::error::Error;
use crate::models::History;

/// Durable storage for the reconciliation history.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Returns a fresh history (start time = now, no codes) when nothing has
    /// been stored yet. That is not an error.
    async fn load(&self) -> Result<History, Error>;

    /// Any write fault is reported as `Error::PersistFailed`.
    async fn save(&self, history: &History) -> Result<(), Error>;
}
