use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::models::code::ShiftCode;

/// Timestamp layout used for `start_time` in the history file.
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Durable reconciliation state.
///
/// - `start_time` is fixed on the first run and acts as a low-water mark:
///   codes added upstream before it are never announced.
/// - `announced_codes` only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(with = "start_time_format")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "codes")]
    pub announced_codes: BTreeSet<String>,
}

impl History {
    /// A fresh history whose low-water mark is `start_time`.
    ///
    /// Sub-second precision is dropped so the in-memory value matches what
    /// the history file can represent.
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: start_time.trunc_subsecs(0),
            announced_codes: BTreeSet::new(),
        }
    }

    pub fn fresh() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn is_announced(&self, code: &str) -> bool {
        self.announced_codes.contains(code)
    }

    /// True if the code was listed upstream before this deployment started.
    pub fn predates_start(&self, code: &ShiftCode) -> bool {
        code.time_added < self.start_time
    }

    /// Either condition is enough to skip a feed record.
    pub fn should_skip(&self, code: &ShiftCode) -> bool {
        self.predates_start(code) || self.is_announced(&code.code)
    }

    /// Returns `true` if the code was not already present.
    pub fn mark_announced(&mut self, code: &str) -> bool {
        self.announced_codes.insert(code.to_string())
    }
}

mod start_time_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::HISTORY_TIME_FORMAT;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(HISTORY_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, HISTORY_TIME_FORMAT)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn code_added_at(code: &str, added: DateTime<Utc>) -> ShiftCode {
        ShiftCode {
            code: code.into(),
            game: "Borderlands 3".into(),
            platform: "Universal".into(),
            reward: "3 Golden Keys".into(),
            time_added: added,
            expires: None,
            source: None,
        }
    }

    #[test]
    fn history_file_layout() {
        let mut history = History::starting_at(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        history.mark_announced("BBBBB");
        history.mark_announced("AAAAA");

        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["start_time"], "2021-01-01 00:00:00 +0000");
        assert_eq!(json["codes"], serde_json::json!(["AAAAA", "BBBBB"]));

        let back: History = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn reads_codes_in_any_order_and_other_offsets() {
        let raw = r#"{"codes": ["Z", "A", "Z"], "start_time": "2021-01-01 02:00:00 +0200"}"#;
        let history: History = serde_json::from_str(raw).unwrap();
        assert_eq!(history.start_time, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(history.announced_codes.len(), 2);
    }

    #[test]
    fn skip_rules() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let mut history = History::starting_at(start);

        let old = code_added_at("OLD", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let new = code_added_at("NEW", Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        let exact = code_added_at("EXACT", start);

        assert!(history.should_skip(&old));
        assert!(!history.should_skip(&new));
        assert!(!history.should_skip(&exact));

        assert!(history.mark_announced("NEW"));
        assert!(!history.mark_announced("NEW"));
        assert!(history.should_skip(&new));
    }
}
