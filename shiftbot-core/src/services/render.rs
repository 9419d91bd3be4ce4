// ========================================================
// File: shiftbot-core/src/services/render.rs
// ========================================================
use chrono::{DateTime, Utc};

use shiftbot_common::models::{CodeEmbed, RoutingRule, ShiftCode};

pub const SHIFT_GOLD: u32 = 0xF4C410;
pub const REDEEM_URL: &str = "https://shift.gearboxsoftware.com/rewards";

/// `1 November, 2020`, or `Unknown` when the code has no known expiry.
pub fn format_expiry(expires: Option<&DateTime<Utc>>) -> String {
    match expires {
        Some(dt) => dt.format("%-d %B, %Y").to_string(),
        None => "Unknown".to_string(),
    }
}

/// Builds the announcement embed for `code` as seen by one destination.
pub fn render_code_embed(code: &ShiftCode, rule: &RoutingRule) -> CodeEmbed {
    let title = format!("{} {}: {}", rule.embed_emoji, code.game, code.reward);

    let mut description = format!(
        "Platform: {}\nExpires: {}.```\n{}```Redeem on the [website]({}) or in game.",
        code.platform,
        format_expiry(code.expires.as_ref()),
        code.code,
        REDEEM_URL
    );
    if let Some(source) = &code.source {
        description.push_str(&format!("\n\n[Source]({source})"));
    }

    CodeEmbed {
        title,
        description,
        color: SHIFT_GOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rule() -> RoutingRule {
        serde_json::from_str(r#"{"destination_id": "1", "news_channel_id": "2", "embed_emoji": ":key:"}"#).unwrap()
    }

    #[test]
    fn embed_with_expiry_and_source() {
        let code = ShiftCode {
            code: "W9K3T-XXXXX".into(),
            game: "Borderlands 3".into(),
            platform: "Universal".into(),
            reward: "3 Golden Keys".into(),
            time_added: Utc::now(),
            expires: Some(Utc.with_ymd_and_hms(2020, 11, 1, 5, 0, 0).unwrap()),
            source: Some("https://example.com/post".into()),
        };

        let embed = render_code_embed(&code, &rule());
        assert_eq!(embed.title, ":key: Borderlands 3: 3 Golden Keys");
        assert_eq!(embed.color, SHIFT_GOLD);
        assert!(embed.description.starts_with("Platform: Universal\nExpires: 1 November, 2020."));
        assert!(embed.description.contains("```\nW9K3T-XXXXX```"));
        assert!(embed.description.ends_with("[Source](https://example.com/post)"));
    }

    #[test]
    fn manual_code_without_source_or_expiry() {
        let code = ShiftCode::manual("Borderlands 2", "5 Golden Keys", "PC", None, "ABCDE");
        let embed = render_code_embed(&code, &rule());
        assert!(embed.description.contains("Expires: Unknown."));
        assert!(!embed.description.contains("[Source]"));
    }
}
