use chrono::{DateTime, Utc};

use crate::models::code::ShiftCode;

/// The only feed schema version this build understands. Anything else is
/// treated as an upstream breaking change.
pub const EXPECTED_FEED_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMetadata {
    pub version: String,
    pub generated: DateTime<Utc>,
}

/// A decoded feed: metadata plus the code records in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub metadata: FeedMetadata,
    pub codes: Vec<ShiftCode>,
}
