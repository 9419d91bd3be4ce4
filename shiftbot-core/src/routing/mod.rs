// File: shiftbot-core/src/routing/mod.rs

use regex::Regex;
use tracing::debug;

use shiftbot_common::models::RoutingRule;
use shiftbot_common::traits::GameMatcher;

use crate::Error;

/// Case-sensitive regex *search* against the game name.
pub struct RegexMatcher {
    pattern: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::ConfigInvalid(format!("Invalid game_pattern '{pattern}': {e}")))?;
        Ok(Self { pattern })
    }
}

impl GameMatcher for RegexMatcher {
    fn matches(&self, game: &str) -> bool {
        self.pattern.is_match(game)
    }
}

/// A routing rule together with the predicate that decides which games it wants.
pub struct Route {
    pub rule: RoutingRule,
    matcher: Box<dyn GameMatcher>,
}

impl Route {
    pub fn new(rule: RoutingRule, matcher: Box<dyn GameMatcher>) -> Self {
        Self { rule, matcher }
    }

    pub fn from_rule(rule: RoutingRule) -> Result<Self, Error> {
        let matcher = RegexMatcher::new(&rule.game_pattern)?;
        Ok(Self::new(rule, Box::new(matcher)))
    }

    pub fn matches(&self, game: &str) -> bool {
        self.matcher.matches(game)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("rule", &self.rule).finish_non_exhaustive()
    }
}

/// Static destination rules, read-only after load. Order is significant:
/// fan-out happens in list order.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Parses the routes file contents (a JSON list of rule objects).
    ///
    /// An empty list is structurally valid; refusing to start without routes
    /// is the caller's decision.
    pub fn load(raw: &str) -> Result<Self, Error> {
        let mut de = serde_json::Deserializer::from_str(raw);
        let rules: Vec<RoutingRule> = serde_path_to_error::deserialize(&mut de)
            .map_err(|e| Error::ConfigInvalid(format!("{} (at `{}`)", e.inner(), e.path())))?;
        Self::from_rules(rules)
    }

    pub fn from_rules(rules: Vec<RoutingRule>) -> Result<Self, Error> {
        let routes = rules
            .into_iter()
            .enumerate()
            .map(|(idx, rule)| {
                if rule.destination_id.trim().is_empty() {
                    return Err(Error::ConfigInvalid(format!("route {idx}: destination_id is empty")));
                }
                if rule.news_channel_id.trim().is_empty() {
                    return Err(Error::ConfigInvalid(format!("route {idx}: news_channel_id is empty")));
                }
                debug!(
                    "Route {idx} => destination={} channel={} pattern='{}'",
                    rule.destination_id, rule.news_channel_id, rule.game_pattern
                );
                Route::from_rule(rule)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    pub fn from_routes(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every route whose predicate accepts `game`, in list order.
    pub fn matching<'a>(&'a self, game: &'a str) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes.iter().filter(move |r| r.matches(game))
    }

    /// Routes that take manual commands from `channel_id`, in list order.
    pub fn for_command_channel<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes
            .iter()
            .filter(move |r| r.rule.accepts_commands_from(channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftbot_common::models::routing::{DEFAULT_EMBED_EMOJI, MATCH_ALL_PATTERN};

    #[test]
    fn defaults_for_optional_fields() {
        let table = RoutingTable::load(r#"[{"destination_id": "1", "news_channel_id": "2"}]"#).unwrap();
        let rule = &table.routes()[0].rule;
        assert_eq!(rule.game_pattern, MATCH_ALL_PATTERN);
        assert_eq!(rule.embed_emoji, DEFAULT_EMBED_EMOJI);
        assert_eq!(rule.command_channel_id, None);
        assert_eq!(rule.announce_role_id, None);
        assert!(table.routes()[0].matches("Tiny Tina's Wonderlands"));
    }

    #[test]
    fn empty_list_is_valid() {
        let table = RoutingTable::load("[]").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn missing_channel_is_config_invalid() {
        let err = RoutingTable::load(r#"[{"destination_id": "1"}]"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(ref m) if m.contains("news_channel_id")), "{err:?}");
    }

    #[test]
    fn bad_regex_and_unknown_fields_are_rejected() {
        let bad_regex = r#"[{"destination_id": "1", "news_channel_id": "2", "game_pattern": "Border(lands"}]"#;
        assert!(matches!(RoutingTable::load(bad_regex), Err(Error::ConfigInvalid(_))));

        let typo = r#"[{"destination_id": "1", "news_channel_id": "2", "game_patern": "x"}]"#;
        assert!(matches!(RoutingTable::load(typo), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn pattern_is_a_case_sensitive_search() {
        let table = RoutingTable::load(
            r#"[
                {"destination_id": "1", "news_channel_id": "10", "game_pattern": "Borderlands"},
                {"destination_id": "2", "news_channel_id": "20", "game_pattern": "^Tiny"},
                {"destination_id": "3", "news_channel_id": "30"}
            ]"#,
        )
        .unwrap();

        let hits: Vec<_> = table
            .matching("Borderlands: The Pre-Sequel")
            .map(|r| r.rule.news_channel_id.as_str())
            .collect();
        assert_eq!(hits, vec!["10", "30"]);

        let hits: Vec<_> = table.matching("borderlands 3").map(|r| r.rule.news_channel_id.as_str()).collect();
        assert_eq!(hits, vec!["30"]);
    }

    #[test]
    fn closures_work_as_matchers() {
        let rule: RoutingRule =
            serde_json::from_str(r#"{"destination_id": "1", "news_channel_id": "2"}"#).unwrap();
        let route = Route::new(rule, Box::new(|game: &str| game == "Borderlands 3"));
        assert!(route.matches("Borderlands 3"));
        assert!(!route.matches("Borderlands 2"));
    }
}
