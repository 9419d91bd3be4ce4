use async_trait::async_trait;

use crate::error::Error;

/// Transport for the raw feed payload.
///
/// Implementations own their timeout policy and must surface transport or
/// status failures as `Error::FeedUnavailable` rather than hang.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, Error>;
}
