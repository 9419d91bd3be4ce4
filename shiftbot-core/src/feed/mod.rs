// File: shiftbot-core/src/feed/mod.rs

pub mod http;
pub mod parser;

pub use http::{HttpFeedSource, DEFAULT_FEED_URL};
pub use parser::FeedParser;
