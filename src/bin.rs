//! lokal-receipts - buyer receipt copies for the Lokal storefront

use clap::Parser;
use lokal_receipts::{
    config::TriggerConfig, database::sled::SledReceiptDatabase, trigger::Trigger,
};
use std::{path::Path, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Flags override the `LOKAL_*` environment, which overrides the defaults.
#[derive(Parser, Debug)]
#[command(name = "lokal-receipts")]
#[command(about = "Creates buyer-facing copies of newly stored receipts")]
struct Args {
    /// Path to the sled database [env: LOKAL_DATABASE_PATH]
    #[arg(long)]
    database: Option<String>,

    /// Longest single wait on the change feed, in milliseconds
    /// [env: LOKAL_POLL_INTERVAL_MS]
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Do not process receipts stored before startup [env: LOKAL_CATCH_UP=false]
    #[arg(long)]
    no_catch_up: bool,

    /// Process stored receipts once and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, env = "LOKAL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, mut config: TriggerConfig) -> TriggerConfig {
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Some(ms) = self.poll_interval_ms.filter(|ms| *ms > 0) {
            config.poll_interval_ms = ms;
        }
        if self.no_catch_up {
            config.catch_up = false;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting lokal-receipts v{}", env!("CARGO_PKG_VERSION"));

    let config = args.apply(TriggerConfig::from_env());
    let db = Arc::new(SledReceiptDatabase::new(Path::new(&config.database_path))?);
    tracing::info!(
        path = %config.database_path,
        catch_up = config.catch_up,
        "Receipt store opened"
    );

    let trigger = Trigger::new(Arc::clone(&db), config);
    if args.once {
        trigger.catch_up()?;
    } else {
        let handle = trigger.spawn()?;
        wait_for_shutdown().await?;
        tracing::info!("Shutdown requested");
        handle.stop()?;
    }

    db.flush()?;
    tracing::info!("Receipt store flushed");
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
