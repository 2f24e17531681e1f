use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use stock_watcher::cache::FoundCache;
use stock_watcher::config::AppConfig;
use stock_watcher::dispatch::{NotificationDispatcher, NotificationQueue};
use stock_watcher::models::{load_items, AvailabilityEvent, AvailabilityVerdict, TrackedItem};
use stock_watcher::monitor::{CycleRunner, MonitorSettings};
use stock_watcher::plugins::notifiers::PushoverNotifier;
use stock_watcher::plugins::traits::Notifier;
use stock_watcher::plugins::RetailerRegistry;
use stock_watcher::scheduler::{relay_shutdown, shutdown_channel, MonitorScheduler};
use stock_watcher::scraper::{ChromeLauncher, SessionLauncher};
use stock_watcher::utils::logging;

#[derive(Debug, Parser)]
#[command(name = "stock-watcher", version, about = "Watches retailer product pages and notifies when items come back in stock")]
struct Cli {
    /// Configuration file; defaults to config/default, config/$RUN_MODE and config/local
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tracked items file (JSON5)
    #[arg(long)]
    items: Option<PathBuf>,

    /// Found cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the matching retailer probe against one URL and print the verdict
    Probe { url: String },
    /// Send a test notification through the configured transport
    CheckNotify,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(items) = &cli.items {
        config.files.items_path = items.clone();
    }
    if let Some(cache) = &cli.cache {
        config.files.cache_path = cache.clone();
    }

    let _log_guard = logging::init(&config.logging)?;

    match cli.command {
        Some(Command::Probe { url }) => probe_url(&config, &url).await,
        Some(Command::CheckNotify) => check_notify(&config).await,
        None => watch(config, cli.once).await,
    }
}

async fn watch(config: AppConfig, once: bool) -> Result<()> {
    config.require_credentials()?;

    let items = load_items(&config.files.items_path)?;
    info!("Loaded {} items to monitor", items.len());
    let cache = FoundCache::load(&config.files.cache_path)?;

    let registry = Arc::new(RetailerRegistry::with_default_retailers(&config.monitor.disabled_retailers)?);
    info!("Retailers: {}", registry.names().join(", "));
    let notifier: Arc<dyn Notifier> = Arc::new(PushoverNotifier::new(&config.pushover)?);
    let (queue, receiver) = NotificationQueue::channel();
    let dispatcher = NotificationDispatcher::new(notifier, receiver).spawn();

    let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
    let runner = CycleRunner::new(registry, launcher, queue, MonitorSettings::from_config(&config));
    let mut scheduler = MonitorScheduler::new(runner, items, cache, config.monitor.cycle_interval());

    if once {
        let result = scheduler.run_once().await;
        drop(scheduler);
        let stats = dispatcher.await?;
        info!("Notifications delivered: {}, failed: {}", stats.delivered, stats.failed);
        result?;
        return Ok(());
    }

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        relay_shutdown(trigger, shutdown_signal).await;
        std::process::exit(0);
    });

    scheduler.run(shutdown).await;
    let stats = dispatcher.await?;
    info!("Notifications delivered: {}, failed: {}", stats.delivered, stats.failed);
    Ok(())
}

async fn probe_url(config: &AppConfig, url: &str) -> Result<()> {
    let registry = RetailerRegistry::with_default_retailers(&config.monitor.disabled_retailers)?;
    let binding = registry
        .resolve(url)
        .ok_or_else(|| anyhow!("No retailer found for URL '{}'", url))?;

    if !binding.is_enabled() {
        tracing::warn!("{} is disabled for monitoring; probing anyway", binding.name());
    }

    let item = TrackedItem::new("probe", url);
    let launcher = ChromeLauncher::new(config.browser.clone());
    let mut session = launcher.open().await?;

    info!("Processing with {}", binding.name());
    let check = binding.probe().check_availability(session.as_mut(), &item);
    let verdict = match tokio::time::timeout(config.monitor.probe_timeout(), check).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            tracing::error!("Probe failed: {}", e);
            AvailabilityVerdict::CheckFailed
        }
        Err(_) => {
            tracing::error!("Probe timed out after {:?}", config.monitor.probe_timeout());
            AvailabilityVerdict::CheckFailed
        }
    };

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }

    println!("{}: {}", binding.name(), verdict);
    Ok(())
}

async fn check_notify(config: &AppConfig) -> Result<()> {
    config.require_credentials()?;

    let notifier = PushoverNotifier::new(&config.pushover)?;
    let event = AvailabilityEvent {
        name: "stock-watcher test".to_string(),
        url: "https://pushover.net".to_string(),
        detected_at: Utc::now(),
    };

    let result = notifier.notify(&event).await?;
    println!(
        "Notification delivered: {}",
        result.message_id.as_deref().unwrap_or("no request id")
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
