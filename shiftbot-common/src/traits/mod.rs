pub mod feed_traits;
pub mod notifier_traits;
pub mod repository_traits;
pub mod routing_traits;

pub use feed_traits::FeedSource;
pub use notifier_traits::Notifier;
pub use repository_traits::HistoryRepository;
pub use routing_traits::GameMatcher;
