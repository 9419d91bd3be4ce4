// File: shiftbot-common/src/models/mod.rs
pub mod code;
pub mod discord;
pub mod feed;
pub mod history;
pub mod routing;

pub use code::ShiftCode;
pub use discord::{CodeEmbed, InboundCommand, MessageHandle};
pub use feed::{FeedMetadata, FeedSnapshot, EXPECTED_FEED_VERSION};
pub use history::History;
pub use routing::RoutingRule;
