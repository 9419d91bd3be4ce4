use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use shiftbot_core::feed::DEFAULT_FEED_URL;

mod context;
mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "shiftbot")]
#[command(author, version, about = "ShiftBot - announces new SHiFT codes to Discord channels")]
pub struct Args {
    /// Routing table (JSON list of destinations).
    #[arg(long, default_value = "routes.json")]
    routes: PathBuf,

    /// Where announced codes and the start time are kept.
    #[arg(long, default_value = "history.json")]
    history: PathBuf,

    #[arg(long, default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    #[arg(long, default_value_t = 900)]
    poll_interval_secs: u64,

    /// File holding the bot token. Falls back to `DISCORD_TOKEN`.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Run a single reconciliation cycle and exit.
    #[arg(long, default_value = "false")]
    once: bool,

    /// Log announcements instead of sending them.
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("shiftbot=info".parse().unwrap_or_default())
        .add_directive("shiftbot_core=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "ShiftBot starting. routes={}, history={}, once={}, dry_run={}",
        args.routes.display(),
        args.history.display(),
        args.once,
        args.dry_run
    );

    let result = if args.once {
        server::run_once(&args).await
    } else {
        server::run_server(&args).await
    };

    if let Err(e) = &result {
        error!("ShiftBot stopped with error: {e:#}");
    } else {
        info!("Main finished. Goodbye!");
    }
    result
}
