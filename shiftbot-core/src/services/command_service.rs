// ========================================================
// File: shiftbot-core/src/services/command_service.rs
// ========================================================
//
// Manual code entry from a route's command channel:
//
//   post <game> <reward> <platform> <expires|Unknown> <code>
//   edit <messageId> <game> <reward> <platform> <expires|Unknown> <code>
//
// Arguments with spaces are double-quoted.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use shiftbot_common::models::{InboundCommand, ShiftCode};
use shiftbot_common::traits::Notifier;

use crate::Error;
use crate::routing::Route;
use crate::services::reconciliation::ReconciliationEngine;

pub const POST_USAGE: &str = "post <game> <reward> <platform> <expires|Unknown> <code>";
pub const EDIT_USAGE: &str = "edit <messageId> <game> <reward> <platform> <expires|Unknown> <code>";

const EXPIRY_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%d %B, %Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualCommand {
    Post { code: ShiftCode },
    Edit { message_id: String, code: ShiftCode },
}

/// Splits on whitespace, keeping double-quoted segments together.
pub fn tokenize(input: &str) -> Result<Vec<String>, Error> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(Error::CommandFormatInvalid("unterminated quote".into()));
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// `Unknown` means no expiry; dates are taken as the end of that day, UTC.
pub fn parse_expiry(raw: &str) -> Result<Option<DateTime<Utc>>, Error> {
    if raw.eq_ignore_ascii_case("unknown") {
        return Ok(None);
    }
    EXPIRY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| Error::CommandFormatInvalid(format!("unrecognized expiry date '{raw}'")))
}

/// `Ok(None)` when the text is not a command at all.
pub fn parse_command(text: &str) -> Result<Option<ManualCommand>, Error> {
    let tokens = tokenize(text)?;
    let Some((keyword, args)) = tokens.split_first() else {
        return Ok(None);
    };

    match keyword.to_ascii_lowercase().as_str() {
        "post" => match args {
            [game, reward, platform, expires, code] => {
                let expires = parse_expiry(expires)?;
                Ok(Some(ManualCommand::Post {
                    code: ShiftCode::manual(game, reward, platform, expires, code),
                }))
            }
            _ => Err(Error::CommandFormatInvalid(format!("expected `{POST_USAGE}`"))),
        },
        "edit" => match args {
            [message_id, game, reward, platform, expires, code] => {
                if message_id.parse::<u64>().is_err() {
                    return Err(Error::CommandFormatInvalid(format!("'{message_id}' is not a message id")));
                }
                let expires = parse_expiry(expires)?;
                Ok(Some(ManualCommand::Edit {
                    message_id: message_id.clone(),
                    code: ShiftCode::manual(game, reward, platform, expires, code),
                }))
            }
            _ => Err(Error::CommandFormatInvalid(format!("expected `{EDIT_USAGE}`"))),
        },
        _ => Ok(None),
    }
}

/// Feeds operator commands into the same posting path the poller uses.
pub struct ManualCommandHandler {
    engine: Arc<ReconciliationEngine>,
    notifier: Arc<dyn Notifier>,
}

impl ManualCommandHandler {
    pub fn new(engine: Arc<ReconciliationEngine>, notifier: Arc<dyn Notifier>) -> Self {
        Self { engine, notifier }
    }

    /// Handles one inbound message and returns the reply sent back, if any.
    ///
    /// Only fatal errors (history could not be saved) escape; everything else
    /// becomes a reply in the command channel.
    pub async fn handle(&self, cmd: &InboundCommand) -> Result<Option<String>, Error> {
        let routes: Vec<&Route> = self.engine.routes().for_command_channel(&cmd.channel_id).collect();
        if routes.is_empty() {
            return Ok(None);
        }

        let parsed = match parse_command(&cmd.content) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!("Rejected command from {} in {}: {e}", cmd.author, cmd.channel_id);
                let reply = format!("Unrecognized format. Usage: `{POST_USAGE}` or `{EDIT_USAGE}`");
                self.reply(&cmd.channel_id, &reply).await;
                return Ok(Some(reply));
            }
        };

        let reply = match parsed {
            ManualCommand::Post { code } => {
                info!("Manual post by {} => code={} game='{}'", cmd.author, code.code, code.game);
                match self.engine.announce(&code, &routes).await {
                    Ok(_) => format!("Posted {}.", code.code),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => format!("Could not post {}: {e}", code.code),
                }
            }
            ManualCommand::Edit { message_id, code } => {
                info!("Manual edit by {} => message={} code={}", cmd.author, message_id, code.code);
                match self.engine.edit(&code, &routes, &message_id).await {
                    Ok(_) => format!("Edited {message_id}."),
                    Err(Error::MessageNotFound(_)) => format!("Message {message_id} does not exist."),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => format!("Could not edit {message_id}: {e}"),
                }
            }
        };

        self.reply(&cmd.channel_id, &reply).await;
        Ok(Some(reply))
    }

    async fn reply(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.notifier.send_text(channel_id, text).await {
            warn!("Could not reply in channel={}: {e}", channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tokenizer_keeps_quoted_segments() {
        let tokens = tokenize(r#"post "Borderlands 3" "3 Golden Keys" Universal Unknown ABCDE"#).unwrap();
        assert_eq!(tokens, vec!["post", "Borderlands 3", "3 Golden Keys", "Universal", "Unknown", "ABCDE"]);
    }

    #[test]
    fn tokenizer_handles_empty_quotes_and_extra_spaces() {
        let tokens = tokenize("  a   \"\"  b ").unwrap();
        assert_eq!(tokens, vec!["a", "", "b"]);
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn tokenizer_rejects_unterminated_quote() {
        assert!(matches!(tokenize(r#"post "Borderlands 3"#), Err(Error::CommandFormatInvalid(_))));
    }

    #[test]
    fn expiry_formats() {
        let end_of_day = Utc.with_ymd_and_hms(2020, 11, 1, 23, 59, 59).unwrap();
        assert_eq!(parse_expiry("Unknown").unwrap(), None);
        assert_eq!(parse_expiry("unknown").unwrap(), None);
        assert_eq!(parse_expiry("2020-11-01").unwrap(), Some(end_of_day));
        assert_eq!(parse_expiry("1 November 2020").unwrap(), Some(end_of_day));
        assert_eq!(parse_expiry("1 November, 2020").unwrap(), Some(end_of_day));
        assert!(parse_expiry("next tuesday").is_err());
    }

    #[test]
    fn parses_post() {
        let cmd = parse_command(r#"post "Borderlands 3" "3 Golden Keys" Universal Unknown ABCDE"#)
            .unwrap()
            .unwrap();
        match cmd {
            ManualCommand::Post { code } => {
                assert_eq!(code.code, "ABCDE");
                assert_eq!(code.game, "Borderlands 3");
                assert_eq!(code.reward, "3 Golden Keys");
                assert_eq!(code.platform, "Universal");
                assert_eq!(code.expires, None);
                assert_eq!(code.source, None);
            }
            other => panic!("expected post, got {other:?}"),
        }
    }

    #[test]
    fn parses_edit() {
        let cmd = parse_command(r#"EDIT 123456789 "Borderlands 2" "5 Golden Keys" PC 2020-11-01 ABCDE"#)
            .unwrap()
            .unwrap();
        assert!(matches!(cmd, ManualCommand::Edit { ref message_id, .. } if message_id == "123456789"));
    }

    #[test]
    fn malformed_commands() {
        assert!(matches!(parse_command("post too few args"), Err(Error::CommandFormatInvalid(_))));
        assert!(matches!(
            parse_command(r#"edit notanid "Borderlands 2" Keys PC Unknown ABCDE"#),
            Err(Error::CommandFormatInvalid(_))
        ));
        assert!(matches!(
            parse_command(r#"post "Borderlands 2" Keys PC someday ABCDE"#),
            Err(Error::CommandFormatInvalid(_))
        ));
    }

    #[test]
    fn chatter_is_not_a_command() {
        assert_eq!(parse_command("anyone got codes?").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
    }
}
