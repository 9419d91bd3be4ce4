//! src/tasks/poll_scheduler.rs
//!
//! Drives the reconciliation engine on a fixed interval and serializes it
//! with manual commands.
//!
//! One worker owns the engine. The poll timer and the inbound command queue
//! are two branches of the same `select!`, so a poll cycle and a manual
//! command never run at the same time. Shutdown is only observed between
//! jobs: it cancels a pending sleep immediately but never interrupts a cycle
//! that is committing history.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use shiftbot_common::models::InboundCommand;
use shiftbot_common::traits::FeedSource;

use crate::{Error, Severity};
use crate::services::command_service::ManualCommandHandler;
use crate::services::reconciliation::{CycleReport, ReconciliationEngine};

/// Fixed delay between polls. No backoff is layered on top.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

const JOB_QUEUE_SIZE: usize = 64;

#[derive(Debug)]
pub enum Job {
    Poll,
    Command(InboundCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
    Sleeping,
    Stopped,
}

/// Tagged result of one poll cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Cycle skipped; try again next interval.
    Transient(String),
    /// Stop the scheduler.
    Fatal(Error),
}

impl CycleOutcome {
    pub fn classify(result: Result<CycleReport, Error>) -> Self {
        match result {
            Ok(report) => CycleOutcome::Completed(report),
            Err(e) => match e.severity() {
                Severity::Fatal => CycleOutcome::Fatal(e),
                Severity::Transient | Severity::Local => CycleOutcome::Transient(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    QueueClosed,
}

/// Fetches the feed once and reconciles it.
pub async fn poll_once(feed: &dyn FeedSource, engine: &ReconciliationEngine) -> CycleOutcome {
    let raw = match feed.fetch().await {
        Ok(raw) => raw,
        Err(e) => return CycleOutcome::classify(Err(e)),
    };
    CycleOutcome::classify(engine.reconcile(&raw).await)
}

/// Cloneable front door to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    jobs: mpsc::Sender<Job>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    state_rx: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub async fn submit_command(&self, cmd: InboundCommand) -> Result<(), Error> {
        self.jobs
            .send(Job::Command(cmd))
            .await
            .map_err(|_| Error::Platform("scheduler is no longer accepting jobs".into()))
    }

    /// Queues an extra poll; the regular interval restarts after it.
    pub async fn poll_now(&self) -> Result<(), Error> {
        self.jobs
            .send(Job::Poll)
            .await
            .map_err(|_| Error::Platform("scheduler is no longer accepting jobs".into()))
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }
}

pub struct PollScheduler {
    engine: Arc<ReconciliationEngine>,
    commands: ManualCommandHandler,
    feed: Arc<dyn FeedSource>,
    interval: Duration,
    jobs_rx: mpsc::Receiver<Job>,
    shutdown_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<SchedulerState>,
    feed_degraded: bool,
}

impl PollScheduler {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        commands: ManualCommandHandler,
        feed: Arc<dyn FeedSource>,
        interval: Duration,
    ) -> (Self, SchedulerHandle) {
        let (jobs_tx, jobs_rx) = mpsc::channel(JOB_QUEUE_SIZE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let scheduler = Self {
            engine,
            commands,
            feed,
            interval,
            jobs_rx,
            shutdown_rx,
            state_tx,
            feed_degraded: false,
        };
        let handle = SchedulerHandle {
            jobs: jobs_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            state_rx,
        };
        (scheduler, handle)
    }

    pub fn spawn(self) -> JoinHandle<Result<StopReason, Error>> {
        tokio::spawn(self.run())
    }

    /// Polls immediately, then every `interval` after the previous job
    /// finished, until shutdown or a fatal error.
    pub async fn run(mut self) -> Result<StopReason, Error> {
        info!("Poll scheduler started with interval={}s", self.interval.as_secs());
        let mut next_poll = Instant::now();

        let result = loop {
            tokio::select! {
                biased;
                Ok(_) = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Poll scheduler shutting down => break from loop.");
                        break Ok(StopReason::Shutdown);
                    }
                }
                _ = sleep_until(next_poll) => {
                    if let Err(e) = self.poll().await {
                        break Err(e);
                    }
                    next_poll = Instant::now() + self.interval;
                }
                job = self.jobs_rx.recv() => {
                    match job {
                        Some(Job::Poll) => {
                            if let Err(e) = self.poll().await {
                                break Err(e);
                            }
                            next_poll = Instant::now() + self.interval;
                        }
                        Some(Job::Command(cmd)) => {
                            if let Err(e) = self.commands.handle(&cmd).await {
                                error!("Fatal error while handling a manual command: {e}");
                                break Err(e);
                            }
                        }
                        None => {
                            info!("Job queue closed => stopping poll scheduler.");
                            break Ok(StopReason::QueueClosed);
                        }
                    }
                }
            }
        };

        self.state_tx.send_replace(SchedulerState::Stopped);
        result
    }

    /// One poll cycle. Only fatal outcomes come back as `Err`.
    async fn poll(&mut self) -> Result<(), Error> {
        self.state_tx.send_replace(SchedulerState::Polling);
        let outcome = poll_once(self.feed.as_ref(), &self.engine).await;

        match outcome {
            CycleOutcome::Completed(report) => {
                if self.feed_degraded {
                    info!("Feed is reachable again.");
                    self.feed_degraded = false;
                }
                if report.announced.is_empty() {
                    debug!(
                        "Cycle done => {} candidates, nothing new (known={}, predating={}, failed={})",
                        report.candidates, report.skipped_known, report.skipped_predating, report.failed
                    );
                } else {
                    info!(
                        "Cycle done => {} candidates, announced {} new codes",
                        report.candidates,
                        report.announced.len()
                    );
                }
            }
            CycleOutcome::Transient(reason) => {
                if self.feed_degraded {
                    debug!("Feed still unavailable: {reason}");
                } else {
                    warn!("Could not get feed data, skipping this cycle: {reason}");
                    self.feed_degraded = true;
                }
            }
            CycleOutcome::Fatal(e) => {
                error!("Fatal error in poll cycle, stopping scheduler: {e}");
                return Err(e);
            }
        }

        self.state_tx.send_replace(SchedulerState::Sleeping);
        Ok(())
    }
}
