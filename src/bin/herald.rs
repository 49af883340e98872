//! Herald service binary.

use anyhow::Context;
use clap::Parser;
use herald::notify::{DiscordNotifier, LogNotifier, Notifier};
use herald::{Herald, HeraldConfig, StatePaths, herald_dirs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Watches release feeds, workshop collections, a sync repository and a
/// calendar, and posts what changed.
#[derive(Parser)]
#[command(name = "herald", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log notifications instead of delivering them.
    #[arg(long)]
    dry_run: bool,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = herald_dirs::logs_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let (file_writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "herald.log"));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("herald=info,herald_sources=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let path = cli.config.unwrap_or_else(herald_dirs::config_file);
    let mut config = HeraldConfig::from_file(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    if cli.check {
        println!("{} is valid", path.display());
        return Ok(());
    }

    let notifier: Arc<dyn Notifier> = if cli.dry_run {
        info!("dry run: notifications are logged only");
        Arc::new(LogNotifier)
    } else {
        Arc::new(DiscordNotifier::new(&config.discord)?)
    };

    info!(config = %path.display(), version = env!("CARGO_PKG_VERSION"), "starting herald");
    let herald = Herald::start(&config, notifier, StatePaths::default()).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    herald.shutdown().await;
    Ok(())
}
