//! shiftbot-server/src/context.rs
//!
//! Everything the bot needs before it can poll: routes, history store, feed
//! source and the Discord token.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use shiftbot_common::traits::{FeedSource, HistoryRepository, Notifier};
use shiftbot_core::feed::{FeedParser, HttpFeedSource};
use shiftbot_core::repositories::{JsonFileHistoryStore, MemoryHistoryStore};
use shiftbot_core::routing::RoutingTable;
use shiftbot_core::services::ReconciliationEngine;
use shiftbot_core::Error;

use crate::Args;

const TOKEN_ENV: &str = "DISCORD_TOKEN";

pub struct ServerContext {
    pub routes: Arc<RoutingTable>,
    pub store: Arc<dyn HistoryRepository>,
    pub feed: Arc<dyn FeedSource>,
    /// `None` only in dry-run mode.
    pub token: Option<String>,
    pub interval: Duration,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let routes = load_routes(&args.routes)?;
        info!("Loaded {} routes from {}", routes.len(), args.routes.display());

        let file_store = JsonFileHistoryStore::new(&args.history);
        let store: Arc<dyn HistoryRepository> = if args.dry_run {
            // Start from the real history but never write it back.
            let seeded = file_store.load().await?;
            Arc::new(MemoryHistoryStore::with_history(seeded))
        } else {
            Arc::new(file_store)
        };

        let token = resolve_token(args.token_file.as_deref(), std::env::var(TOKEN_ENV).ok())?;
        if token.is_none() && !args.dry_run {
            return Err(Error::ConfigInvalid(format!(
                "no bot token: pass --token-file or set {TOKEN_ENV}"
            )));
        }

        if args.poll_interval_secs == 0 {
            return Err(Error::ConfigInvalid("--poll-interval-secs must be positive".into()));
        }

        Ok(Self {
            routes: Arc::new(routes),
            store,
            feed: Arc::new(HttpFeedSource::new(&args.feed_url)?),
            token,
            interval: Duration::from_secs(args.poll_interval_secs),
        })
    }

    /// Channels whose messages may carry manual commands.
    pub fn command_channels(&self) -> HashSet<String> {
        self.routes
            .routes()
            .iter()
            .filter_map(|r| r.rule.command_channel_id.clone())
            .collect()
    }

    pub async fn start_engine(&self, notifier: Arc<dyn Notifier>) -> Result<Arc<ReconciliationEngine>, Error> {
        let engine = ReconciliationEngine::start(
            FeedParser::new(),
            self.routes.clone(),
            notifier,
            self.store.clone(),
        )
        .await?;
        Ok(Arc::new(engine))
    }
}

/// Reads and validates the routing table. No routes means nothing could ever
/// be announced, so that is refused too.
pub fn load_routes(path: &Path) -> Result<RoutingTable, Error> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigInvalid(format!("cannot read routes file {}: {e}", path.display())))?;
    let table = RoutingTable::load(&raw)?;
    if table.is_empty() {
        return Err(Error::ConfigInvalid(format!("{} contains no routes", path.display())));
    }
    Ok(table)
}

/// The token file wins over the environment.
pub fn resolve_token(token_file: Option<&Path>, from_env: Option<String>) -> Result<Option<String>, Error> {
    if let Some(path) = token_file {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigInvalid(format!("cannot read token file {}: {e}", path.display())))?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            return Err(Error::ConfigInvalid(format!("token file {} is empty", path.display())));
        }
        return Ok(Some(token));
    }

    match from_env.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(Some(t)),
        Some(_) => {
            warn!("{TOKEN_ENV} is set but empty");
            Ok(None)
        }
        None => Ok(None),
    }
}
