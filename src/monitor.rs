use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::FoundCache;
use crate::config::AppConfig;
use crate::dispatch::NotificationQueue;
use crate::models::{AvailabilityEvent, AvailabilityVerdict, TrackedItem};
use crate::plugins::registry::{RetailerBinding, RetailerRegistry};
use crate::scraper::{BrowsingSession, SessionLauncher};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Pause after each item that was not skipped.
    pub item_delay: Duration,
    /// Upper bound on one probe invocation.
    pub probe_timeout: Duration,
    pub suppression_window: chrono::Duration,
    pub cache_path: PathBuf,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            item_delay: config.monitor.item_delay(),
            probe_timeout: config.monitor.probe_timeout(),
            suppression_window: config.monitor.suppression_window(),
            cache_path: config.files.cache_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Found within the suppression window; no probe ran.
    Skipped,
    /// No retailer claims the URL.
    Unmatched,
    Checked {
        retailer: String,
        verdict: AvailabilityVerdict,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub available: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub skipped: usize,
    pub unmatched: usize,
    pub notifications_queued: usize,
    /// Sessions discarded after a timed-out probe and reopened.
    pub session_restarts: usize,
    pub cache_persisted: bool,
    pub total_time_ms: u64,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            available: 0,
            unavailable: 0,
            failed: 0,
            skipped: 0,
            unmatched: 0,
            notifications_queued: 0,
            session_restarts: 0,
            cache_persisted: false,
            total_time_ms: 0,
        }
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Unmatched => self.unmatched += 1,
            ItemOutcome::Checked { verdict, .. } => match verdict {
                AvailabilityVerdict::Available => self.available += 1,
                AvailabilityVerdict::Unavailable => self.unavailable += 1,
                AvailabilityVerdict::CheckFailed => self.failed += 1,
            },
        }
    }

    /// Items for which a retailer produced a verdict this cycle.
    pub fn checked(&self) -> usize {
        self.available + self.unavailable + self.failed
    }
}

/// The browsing session of one cycle. A session whose probe timed out may
/// still have a call running on it, so it is closed and replaced lazily by
/// a fresh one before the next probe.
struct SessionSlot<'a> {
    launcher: &'a dyn SessionLauncher,
    current: Option<Box<dyn BrowsingSession>>,
}

impl<'a> SessionSlot<'a> {
    async fn open(launcher: &'a dyn SessionLauncher) -> Result<Self> {
        let current = launcher.open().await?;
        Ok(Self {
            launcher,
            current: Some(current),
        })
    }

    async fn get(&mut self) -> Result<&mut dyn BrowsingSession> {
        if self.current.is_none() {
            tracing::info!("Opening a fresh browser session");
            self.current = Some(self.launcher.open().await?);
        }
        match self.current.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(AppError::Browser("browser session unavailable".to_string())),
        }
    }

    async fn discard(&mut self) {
        if let Some(session) = self.current.take() {
            close_session(session).await;
        }
    }

    async fn close(mut self) {
        self.discard().await;
    }
}

async fn close_session(session: Box<dyn BrowsingSession>) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    } else {
        tracing::debug!("browser closed");
    }
}

/// How a probe invocation ended, and whether its session is still usable.
struct ProbeRun {
    verdict: AvailabilityVerdict,
    session_poisoned: bool,
}

impl ProbeRun {
    fn clean(verdict: AvailabilityVerdict) -> Self {
        Self {
            verdict,
            session_poisoned: false,
        }
    }
}

/// Runs one pass over the tracked items.
///
/// Items are checked strictly one after another, never two on one session
/// at a time. A probe error or timeout only affects its own item, and the
/// found cache is written only on a positive verdict.
pub struct CycleRunner {
    registry: Arc<RetailerRegistry>,
    launcher: Arc<dyn SessionLauncher>,
    notifications: NotificationQueue,
    settings: MonitorSettings,
}

impl CycleRunner {
    pub fn new(
        registry: Arc<RetailerRegistry>,
        launcher: Arc<dyn SessionLauncher>,
        notifications: NotificationQueue,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            launcher,
            notifications,
            settings,
        }
    }

    /// Fails only when the cycle's first browsing session cannot be opened;
    /// the cache is left untouched in that case.
    pub async fn run_cycle(&self, items: &[TrackedItem], cache: &mut FoundCache) -> Result<CycleReport> {
        let start_time = Instant::now();
        let mut report = CycleReport::new(Utc::now());

        let mut sessions = SessionSlot::open(self.launcher.as_ref()).await?;

        for item in items {
            let outcome = self.check_item(&mut sessions, item, cache, &mut report).await;

            if let ItemOutcome::Checked { verdict, .. } = &outcome {
                if verdict.is_available() {
                    report.notifications_queued += 1;
                }
            }

            if outcome != ItemOutcome::Skipped && !self.settings.item_delay.is_zero() {
                tracing::debug!("Waiting {} ms...", self.settings.item_delay.as_millis());
                tokio::time::sleep(self.settings.item_delay).await;
            }

            report.record(&outcome);
        }

        tracing::debug!("finishing...");
        match cache.save(&self.settings.cache_path) {
            Ok(()) => report.cache_persisted = true,
            Err(e) => tracing::error!("Failed to persist found cache to {}: {}", self.settings.cache_path.display(), e),
        }

        sessions.close().await;

        report.finished_at = Utc::now();
        report.total_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn check_item(
        &self,
        sessions: &mut SessionSlot<'_>,
        item: &TrackedItem,
        cache: &mut FoundCache,
        report: &mut CycleReport,
    ) -> ItemOutcome {
        if cache.is_suppressed(&item.name, Utc::now(), self.settings.suppression_window) {
            tracing::info!(item = %item.name, "Item '{}' found recently, skipping check", item.name);
            return ItemOutcome::Skipped;
        }

        let Some(binding) = self.registry.resolve(&item.url) else {
            tracing::warn!(item = %item.name, "No retailer found for URL '{}'", item.url);
            return ItemOutcome::Unmatched;
        };

        tracing::info!(item = %item.name, retailer = binding.name(), "Checking {}", item.name);
        let run = self.probe(binding, sessions, item).await;
        if run.session_poisoned {
            tracing::warn!(item = %item.name, "Discarding browser session after a timeout");
            sessions.discard().await;
            report.session_restarts += 1;
        }
        let verdict = run.verdict;

        match verdict {
            AvailabilityVerdict::Available => {
                let detected_at = Utc::now();
                cache.record(&item.name, detected_at);
                tracing::info!(item = %item.name, retailer = binding.name(), "Item '{}' is available.", item.name);
                self.notifications.enqueue(AvailabilityEvent::new(item, detected_at));
            }
            AvailabilityVerdict::Unavailable => {
                tracing::info!(item = %item.name, retailer = binding.name(), "Item '{}' is not available.", item.name);
            }
            AvailabilityVerdict::CheckFailed => {
                tracing::warn!(item = %item.name, retailer = binding.name(), "Item '{}' could not be checked.", item.name);
            }
        }

        ItemOutcome::Checked {
            retailer: binding.name().to_string(),
            verdict,
        }
    }

    async fn probe(
        &self,
        binding: &RetailerBinding,
        sessions: &mut SessionSlot<'_>,
        item: &TrackedItem,
    ) -> ProbeRun {
        if !binding.is_enabled() {
            tracing::warn!(retailer = binding.name(), "{} handler disabled; treating '{}' as unavailable", binding.name(), item.name);
            return ProbeRun::clean(AvailabilityVerdict::Unavailable);
        }

        let session = match sessions.get().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(item = %item.name, retailer = binding.name(), "Failed to check '{}': {}", item.name, e);
                return ProbeRun::clean(AvailabilityVerdict::CheckFailed);
            }
        };

        let check = binding.probe().check_availability(session, item);
        match tokio::time::timeout(self.settings.probe_timeout, check).await {
            Ok(Ok(verdict)) => ProbeRun::clean(verdict),
            Ok(Err(e)) => {
                tracing::error!(item = %item.name, retailer = binding.name(), "Failed to check '{}': {}", item.name, e);
                ProbeRun {
                    verdict: AvailabilityVerdict::CheckFailed,
                    session_poisoned: matches!(e, AppError::Timeout { .. }),
                }
            }
            Err(_) => {
                tracing::error!(
                    item = %item.name,
                    retailer = binding.name(),
                    "Failed to check '{}': probe timed out after {:?}",
                    item.name,
                    self.settings.probe_timeout
                );
                ProbeRun {
                    verdict: AvailabilityVerdict::CheckFailed,
                    session_poisoned: true,
                }
            }
        }
    }
}
