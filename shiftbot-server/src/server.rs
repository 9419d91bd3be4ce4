// File: shiftbot-server/src/server.rs

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{error, info, warn};

use shiftbot_common::traits::Notifier;
use shiftbot_core::platforms::discord::DiscordPlatform;
use shiftbot_core::platforms::logging::LoggingNotifier;
use shiftbot_core::platforms::PlatformIntegration;
use shiftbot_core::services::ManualCommandHandler;
use shiftbot_core::tasks::{poll_once, CycleOutcome, PollScheduler, StopReason};

use crate::context::ServerContext;
use crate::Args;

/// One cycle over the HTTP API only; the gateway is never opened.
pub async fn run_once(args: &Args) -> anyhow::Result<()> {
    let ctx = ServerContext::new(args).await.context("startup failed")?;

    let notifier: Arc<dyn Notifier> = match &ctx.token {
        Some(token) if !args.dry_run => {
            Arc::new(DiscordPlatform::new(token.clone(), ctx.command_channels()).notifier())
        }
        _ => Arc::new(LoggingNotifier::new()),
    };
    let engine = ctx.start_engine(notifier).await.context("loading history")?;

    match poll_once(ctx.feed.as_ref(), &engine).await {
        CycleOutcome::Completed(report) => {
            info!(
                "Single cycle done => {} candidates, {} announced, {} failed",
                report.candidates,
                report.announced.len(),
                report.failed
            );
            Ok(())
        }
        CycleOutcome::Transient(reason) => {
            warn!("Feed unavailable, nothing done: {reason}");
            Ok(())
        }
        CycleOutcome::Fatal(e) => Err(anyhow!(e).context("reconciliation cycle failed")),
    }
}

pub async fn run_server(args: &Args) -> anyhow::Result<()> {
    let ctx = ServerContext::new(args).await.context("startup failed")?;

    // 1) Outbound + inbound platform
    let mut discord = match (&ctx.token, args.dry_run) {
        (Some(token), false) => Some(DiscordPlatform::new(token.clone(), ctx.command_channels())),
        _ => None,
    };
    let notifier: Arc<dyn Notifier> = match &discord {
        Some(platform) => Arc::new(platform.notifier()),
        None => {
            info!("Dry run => announcements are only logged.");
            Arc::new(LoggingNotifier::new())
        }
    };

    // 2) History + engine
    let engine = ctx.start_engine(notifier.clone()).await.context("loading history")?;

    // 3) Scheduler
    let commands = ManualCommandHandler::new(engine.clone(), notifier);
    let (scheduler, handle) = PollScheduler::new(engine, commands, ctx.feed.clone(), ctx.interval);

    // 4) Gateway => command queue
    let mut forwarder = None;
    if let Some(platform) = discord.as_mut() {
        platform.connect().await.context("connecting to Discord")?;
        if let Some(mut rx) = platform.take_commands().await {
            let handle_for_cmds = handle.clone();
            forwarder = Some(tokio::spawn(async move {
                while let Some(cmd) = rx.recv().await {
                    if let Err(e) = handle_for_cmds.submit_command(cmd).await {
                        warn!("Dropping command, scheduler is gone: {e}");
                        break;
                    }
                }
            }));
        }
    }

    // Ctrl-C => signal
    let handle_for_ctrlc = handle.clone();
    let ctrlc = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; shutting down poll scheduler...");
        handle_for_ctrlc.shutdown();
    });

    let result = scheduler.run().await;

    // Cleanup
    ctrlc.abort();
    if let Some(task) = forwarder {
        task.abort();
    }
    if let Some(platform) = discord.as_mut() {
        if let Err(e) = platform.disconnect().await {
            warn!("Error while disconnecting from Discord: {e}");
        }
    }

    match result {
        Ok(StopReason::Shutdown) => {
            info!("Server shutdown complete.");
            Ok(())
        }
        Ok(StopReason::QueueClosed) => Err(anyhow!("job queue closed unexpectedly")),
        Err(e) => Err(anyhow!(e).context("poll scheduler stopped")),
    }
}
