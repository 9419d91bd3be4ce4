//! HTTP transport for the SHiFT code feed.
//!
//! Wraps reqwest behind the `FeedSource` trait so the reconciliation code can
//! be driven from canned payloads in tests. Everything that goes wrong at
//! the transport level comes back as `Error::FeedUnavailable`; deciding
//! whether the body makes sense is the parser's job.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use shiftbot_common::traits::FeedSource;

use crate::Error;

pub const DEFAULT_FEED_URL: &str = "https://shift.orcicorn.com/shift-code/index.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpFeedSource {
    pub fn new(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url)
            .map_err(|e| Error::ConfigInvalid(format!("invalid feed URL '{url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("shiftbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigInvalid(format!("could not build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>, Error> {
        debug!("Fetching feed from {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::FeedUnavailable(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::FeedUnavailable(format!(
                "feed server responded with non-200 status: {status}"
            )));
        }

        // Content-Type is ignored; the parser checks the body itself.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::FeedUnavailable(format!("reading feed body failed: {e}")))?;
        Ok(body.to_vec())
    }
}
