// File: shiftbot-core/src/feed/parser.rs
//
// Decodes the orcicorn SHiFT feed:
//
//   [ { "meta":  { "version": "1.0", "generated": { "epoch": "1603000000", ... }, ... },
//       "codes": [ { "code": "...", "game": "...", "platform": "...", "reward": "...",
//                    "archived": "<rfc2822>", "expires": "<rfc2822>|Unknown",
//                    "link": "https://..." }, ... ] } ]

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::trace;

use shiftbot_common::models::{FeedMetadata, FeedSnapshot, ShiftCode, EXPECTED_FEED_VERSION};

use crate::Error;

/// Literal the feed uses for "no known expiry".
pub const UNKNOWN_EXPIRY: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    meta: RawMeta,
    codes: Vec<RawCode>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    version: String,
    generated: RawGenerated,
}

#[derive(Debug, Deserialize)]
struct RawGenerated {
    epoch: String,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    code: String,
    game: String,
    platform: String,
    reward: String,
    expires: String,
    link: String,
    archived: String,
}

/// Validates raw feed bytes and turns them into typed records.
#[derive(Debug, Clone)]
pub struct FeedParser {
    expected_version: String,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self::with_expected_version(EXPECTED_FEED_VERSION)
    }

    pub fn with_expected_version(version: impl Into<String>) -> Self {
        Self {
            expected_version: version.into(),
        }
    }

    /// Returns the feed metadata and the codes in feed order.
    ///
    /// - body not JSON at all => `FeedUnavailable`
    /// - JSON of the wrong shape, version mismatch, bad dates => `SchemaInvalid`
    pub fn parse(&self, raw: &[u8]) -> Result<FeedSnapshot, Error> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| Error::FeedUnavailable(format!("feed body is not valid JSON: {e}")))?;

        let envelopes: Vec<RawEnvelope> = serde_path_to_error::deserialize(value)
            .map_err(|e| Error::SchemaInvalid(format!("{} (at `{}`)", e.inner(), e.path())))?;

        let envelope = envelopes
            .into_iter()
            .next()
            .ok_or_else(|| Error::SchemaInvalid("feed envelope list is empty".into()))?;

        if envelope.meta.version != self.expected_version {
            return Err(Error::SchemaInvalid(format!(
                "feed version '{}' does not match expected '{}'",
                envelope.meta.version, self.expected_version
            )));
        }

        let metadata = FeedMetadata {
            version: envelope.meta.version,
            generated: parse_epoch(&envelope.meta.generated.epoch)?,
        };

        let codes = envelope
            .codes
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| convert_code(idx, raw))
            .collect::<Result<Vec<_>, _>>()?;

        trace!("Parsed feed generated at {} with {} codes", metadata.generated, codes.len());
        Ok(FeedSnapshot { metadata, codes })
    }
}

fn convert_code(idx: usize, raw: RawCode) -> Result<ShiftCode, Error> {
    let time_added = parse_feed_date(&raw.archived)
        .map_err(|e| Error::SchemaInvalid(format!("codes[{idx}].archived '{}': {e}", raw.archived)))?;

    let expires = if raw.expires == UNKNOWN_EXPIRY {
        None
    } else {
        let parsed = parse_feed_date(&raw.expires)
            .map_err(|e| Error::SchemaInvalid(format!("codes[{idx}].expires '{}': {e}", raw.expires)))?;
        Some(parsed)
    };

    Ok(ShiftCode {
        code: raw.code,
        game: raw.game,
        platform: raw.platform,
        reward: raw.reward,
        time_added,
        expires,
        source: Some(raw.link),
    })
}

fn parse_feed_date(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc2822(raw.trim()).map(|dt| dt.with_timezone(&Utc))
}

fn parse_epoch(raw: &str) -> Result<DateTime<Utc>, Error> {
    let secs: i64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::SchemaInvalid(format!("meta.generated.epoch '{raw}': {e}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::SchemaInvalid(format!("meta.generated.epoch '{raw}' is out of range")))
}
