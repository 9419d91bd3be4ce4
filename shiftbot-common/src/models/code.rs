use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reward code offer. `code` is the identity: two records with the same
/// code string are the same offer no matter what the other fields say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCode {
    pub code: String,
    pub game: String,
    pub platform: String,
    pub reward: String,
    /// When the upstream feed first listed the code. Manual codes get "now".
    pub time_added: DateTime<Utc>,
    /// `None` means no known expiry.
    pub expires: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl ShiftCode {
    /// Builds a record for a code typed in by an operator.
    pub fn manual(
        game: impl Into<String>,
        reward: impl Into<String>,
        platform: impl Into<String>,
        expires: Option<DateTime<Utc>>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            game: game.into(),
            platform: platform.into(),
            reward: reward.into(),
            time_added: Utc::now(),
            expires,
            source: None,
        }
    }
}
