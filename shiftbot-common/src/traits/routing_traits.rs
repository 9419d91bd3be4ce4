/// Decides whether a route wants codes for a given game.
pub trait GameMatcher: Send + Sync {
    fn matches(&self, game: &str) -> bool;
}

impl<F> GameMatcher for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, game: &str) -> bool {
        self(game)
    }
}
