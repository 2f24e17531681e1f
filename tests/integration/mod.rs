// Shared fakes for the integration tests

pub mod retailer_tests;
pub mod scheduler_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use stock_watcher::dispatch::NotificationQueue;
use stock_watcher::models::{AvailabilityEvent, AvailabilityVerdict, TrackedItem};
use stock_watcher::monitor::{CycleRunner, MonitorSettings};
use stock_watcher::plugins::traits::Probe;
use stock_watcher::plugins::{RetailerBinding, RetailerRegistry};
use stock_watcher::scraper::{BrowsingSession, SessionLauncher};
use stock_watcher::{AppError, Result};

/// What every fake session did, shared with the test body.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub visited: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub failed_opens: AtomicUsize,
}

impl SessionLog {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Serves canned HTML by URL; unknown URLs fail navigation.
pub struct FakeSession {
    pages: Arc<HashMap<String, String>>,
    log: Arc<SessionLog>,
    current: Option<String>,
}

#[async_trait]
impl BrowsingSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.log.visited.lock().unwrap().push(url.to_string());
        if !self.pages.contains_key(url) {
            return Err(AppError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        let url = self
            .current
            .as_ref()
            .ok_or_else(|| AppError::Browser("no page loaded".to_string()))?;
        Ok(self.pages[url].clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        self.log.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    pages: Arc<HashMap<String, String>>,
    log: Arc<SessionLog>,
    /// Number of upcoming `open` calls that fail.
    fail_next: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Arc::new(pages),
            log: Arc::new(SessionLog::default()),
            fail_next: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, count: usize) -> Self {
        self.fail_next.store(count, Ordering::SeqCst);
        self
    }

    pub fn log(&self) -> Arc<SessionLog> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn open(&self) -> Result<Box<dyn BrowsingSession>> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            self.log.failed_opens.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::Browser("Failed to launch browser: no chrome".to_string()));
        }

        self.log.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.log.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            pages: Arc::clone(&self.pages),
            log: Arc::clone(&self.log),
            current: None,
        }))
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Verdict(AvailabilityVerdict),
    Fail(&'static str),
    /// Never completes on its own.
    Hang,
    /// Completes after the given (tokio) time.
    Slow(Duration, AvailabilityVerdict),
}

/// Probe whose answers are scripted per item name; records every call.
pub struct ScriptedProbe {
    name: &'static str,
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, item: &str, scripted: Scripted) -> Self {
        self.script.insert(item.to_string(), scripted);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, item: &str) -> usize {
        self.calls().iter().filter(|name| name.as_str() == item).count()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn check_availability(
        &self,
        session: &mut dyn BrowsingSession,
        item: &TrackedItem,
    ) -> Result<AvailabilityVerdict> {
        self.calls.lock().unwrap().push(item.name.clone());
        let scripted = self
            .script
            .get(&item.name)
            .cloned()
            .unwrap_or(Scripted::Verdict(AvailabilityVerdict::Unavailable));

        match scripted {
            Scripted::Verdict(verdict) => {
                session.navigate(&item.url).await?;
                Ok(verdict)
            }
            Scripted::Fail(message) => Err(AppError::Parse {
                message: message.to_string(),
            }),
            Scripted::Hang => std::future::pending().await,
            Scripted::Slow(delay, verdict) => {
                tokio::time::sleep(delay).await;
                Ok(verdict)
            }
        }
    }
}

pub fn item(name: &str, url: &str) -> TrackedItem {
    TrackedItem::new(name, url)
}

pub fn page(url: &str, html: &str) -> (String, String) {
    (url.to_string(), html.to_string())
}

/// Registry with one scripted probe per pattern, in the given order.
pub fn scripted_registry(bindings: Vec<(&str, Arc<ScriptedProbe>)>) -> RetailerRegistry {
    let mut registry = RetailerRegistry::new();
    for (pattern, probe) in bindings {
        registry.register(RetailerBinding::new(pattern, probe).unwrap());
    }
    registry
}

pub struct Harness {
    pub runner: CycleRunner,
    pub log: Arc<SessionLog>,
    pub notifications: UnboundedReceiver<AvailabilityEvent>,
    pub cache_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(registry: RetailerRegistry, launcher: FakeLauncher) -> Self {
        Self::with_settings(registry, launcher, |_| {})
    }

    pub fn with_settings(
        registry: RetailerRegistry,
        launcher: FakeLauncher,
        customize: impl FnOnce(&mut MonitorSettings),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("found.db.json");
        let mut settings = MonitorSettings {
            item_delay: Duration::ZERO,
            probe_timeout: Duration::from_secs(5),
            suppression_window: chrono::Duration::hours(24),
            cache_path: cache_path.clone(),
        };
        customize(&mut settings);

        let log = launcher.log();
        let (queue, notifications) = NotificationQueue::channel();
        let runner = CycleRunner::new(Arc::new(registry), Arc::new(launcher), queue, settings);

        Self {
            runner,
            log,
            notifications,
            cache_path,
            _dir: dir,
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<AvailabilityEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.notifications.try_recv() {
            events.push(event);
        }
        events
    }
}
