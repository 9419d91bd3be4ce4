//! src/services/reconciliation.rs
//!
//! Turns a raw feed payload into announcements, exactly once per code.
//!
//! The engine owns the in-memory `History` behind an async mutex. Every entry
//! point (feed cycle, manual post, manual edit) holds that lock for its whole
//! read-modify-write and only swaps the new history in after the store has
//! accepted it, so memory never runs ahead of disk.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use shiftbot_common::models::{History, MessageHandle, RoutingRule, ShiftCode};
use shiftbot_common::traits::{HistoryRepository, Notifier};

use crate::Error;
use crate::feed::FeedParser;
use crate::routing::{Route, RoutingTable};
use crate::services::render::render_code_embed;

/// What one feed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub generated: Option<DateTime<Utc>>,
    pub candidates: usize,
    /// Codes delivered to at least one destination, in feed order.
    pub announced: Vec<ShiftCode>,
    pub skipped_predating: usize,
    pub skipped_known: usize,
    /// New codes no route wanted. They are still marked as seen.
    pub unrouted: usize,
    /// Destinations whose send failed. The code is marked as seen anyway and
    /// is not retried.
    pub failed: usize,
}

pub struct ReconciliationEngine {
    parser: FeedParser,
    routes: Arc<RoutingTable>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn HistoryRepository>,
    history: Mutex<History>,
}

impl ReconciliationEngine {
    pub fn new(
        parser: FeedParser,
        routes: Arc<RoutingTable>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn HistoryRepository>,
        history: History,
    ) -> Self {
        Self {
            parser,
            routes,
            notifier,
            store,
            history: Mutex::new(history),
        }
    }

    /// Loads history from `store` and writes it straight back, so a fresh
    /// start time is durable before the first cycle runs.
    pub async fn start(
        parser: FeedParser,
        routes: Arc<RoutingTable>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn HistoryRepository>,
    ) -> Result<Self, Error> {
        let history = store.load().await?;
        persist(store.as_ref(), &history).await?;
        info!(
            "History ready => start_time={}, {} known codes, {} routes",
            history.start_time,
            history.announced_codes.len(),
            routes.len()
        );
        Ok(Self::new(parser, routes, notifier, store, history))
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub async fn history(&self) -> History {
        self.history.lock().await.clone()
    }

    /// Runs one feed cycle over `raw`.
    ///
    /// Parse failures return before history is touched. History is saved at
    /// most once, after every record has been handled; a crash between a send
    /// and that save means the code is sent again next time.
    pub async fn reconcile(&self, raw: &[u8]) -> Result<CycleReport, Error> {
        let snapshot = self.parser.parse(raw)?;

        let mut guard = self.history.lock().await;
        let mut working = guard.clone();
        let mut report = CycleReport {
            generated: Some(snapshot.metadata.generated),
            candidates: snapshot.codes.len(),
            ..Default::default()
        };

        // Feed order, no re-sorting.
        for code in snapshot.codes {
            if working.predates_start(&code) {
                report.skipped_predating += 1;
                continue;
            }
            if working.is_announced(&code.code) {
                report.skipped_known += 1;
                continue;
            }

            let mut matched = 0usize;
            let mut delivered = 0usize;
            for route in self.routes.matching(&code.game) {
                matched += 1;
                match self.dispatch(&code, &route.rule).await {
                    Ok(_) => delivered += 1,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!(
                            "Failed to announce code={} to destination={} channel={}: {e}",
                            code.code, route.rule.destination_id, route.rule.news_channel_id
                        );
                        report.failed += 1;
                    }
                }
            }

            if matched == 0 {
                debug!("No route for game='{}' => marking code={} as seen", code.game, code.code);
                report.unrouted += 1;
            }
            working.mark_announced(&code.code);
            if delivered > 0 {
                report.announced.push(code);
            }
        }

        if working != *guard {
            persist(self.store.as_ref(), &working).await?;
            *guard = working;
        } else {
            debug!("History unchanged => nothing to persist");
        }

        Ok(report)
    }

    /// Manual `post`: always announces, regardless of history, then marks the
    /// code as seen. Returns how many destinations received it.
    pub async fn announce(&self, code: &ShiftCode, routes: &[&Route]) -> Result<usize, Error> {
        let mut guard = self.history.lock().await;

        let mut sent = 0usize;
        let mut first_err = None;
        for route in routes {
            match self.dispatch(code, &route.rule).await {
                Ok(_) => sent += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(
                        "Manual post of code={} to channel={} failed: {e}",
                        code.code, route.rule.news_channel_id
                    );
                    first_err.get_or_insert(e);
                }
            }
        }

        if sent > 0 {
            self.commit_code(&mut guard, &code.code).await?;
        }

        match first_err {
            Some(e) if sent == 0 => Err(e),
            _ => Ok(sent),
        }
    }

    /// Manual `edit`: rewrites a previously sent announcement in place.
    ///
    /// The routes' news channels are tried in order; the first one holding
    /// `message_id` wins. A platform error on one channel moves on to the
    /// next. When no channel accepts the edit, the first such error comes
    /// back, or `Error::MessageNotFound` if there was none, and history is
    /// left alone.
    pub async fn edit(&self, code: &ShiftCode, routes: &[&Route], message_id: &str) -> Result<MessageHandle, Error> {
        let mut guard = self.history.lock().await;

        let mut first_err = None;
        for route in routes {
            let embed = render_code_embed(code, &route.rule);
            match self
                .notifier
                .edit_embed(&route.rule.news_channel_id, message_id, &embed)
                .await
            {
                Ok(()) => {
                    info!(
                        "Edited message={} in channel={} => code={}",
                        message_id, route.rule.news_channel_id, code.code
                    );
                    self.commit_code(&mut guard, &code.code).await?;
                    return Ok(MessageHandle {
                        channel_id: route.rule.news_channel_id.clone(),
                        message_id: message_id.to_string(),
                    });
                }
                Err(Error::MessageNotFound(_)) => {
                    debug!("message={} not in channel={}", message_id, route.rule.news_channel_id);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Could not edit message={} in channel={}: {e}",
                        message_id, route.rule.news_channel_id
                    );
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err.unwrap_or_else(|| Error::MessageNotFound(message_id.to_string())))
    }

    async fn commit_code(&self, current: &mut History, code: &str) -> Result<(), Error> {
        if current.is_announced(code) {
            return Ok(());
        }
        let mut working = current.clone();
        working.mark_announced(code);
        persist(self.store.as_ref(), &working).await?;
        *current = working;
        Ok(())
    }

    /// Sends the embed, publishes it, then pings the subscriber role.
    ///
    /// Only the embed send decides success. Publish and mention failures are
    /// logged: retrying them would resend the embed as well.
    async fn dispatch(&self, code: &ShiftCode, rule: &RoutingRule) -> Result<MessageHandle, Error> {
        let embed = render_code_embed(code, rule);
        let handle = self.notifier.send_embed(&rule.news_channel_id, &embed).await?;
        info!(
            "Announced code={} game='{}' => destination={} channel={}",
            code.code, code.game, rule.destination_id, rule.news_channel_id
        );

        if let Err(e) = self.notifier.publish(&handle).await {
            warn!("Could not publish message={} in channel={}: {e}", handle.message_id, handle.channel_id);
        }

        if let Some(role_id) = &rule.announce_role_id {
            if let Err(e) = self.notifier.mention_role(&rule.news_channel_id, role_id).await {
                warn!("Could not mention role={} in channel={}: {e}", role_id, rule.news_channel_id);
            }
        }

        Ok(handle)
    }
}

async fn persist(store: &dyn HistoryRepository, history: &History) -> Result<(), Error> {
    store.save(history).await.map_err(|e| match e {
        Error::PersistFailed(_) => e,
        other => Error::PersistFailed(other.to_string()),
    })
}
