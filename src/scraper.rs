use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrowserConfig;
use crate::utils::error::{AppError, Result};

// headless_chrome drops the connection after this much silence; a cycle
// with long inter-item delays must not trip it.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// A rendered page handle shared by every probe of one cycle.
#[async_trait]
pub trait BrowsingSession: Send {
    /// Navigates to `url` and waits for the page to finish loading.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Returns the rendered document of the current page.
    async fn content(&mut self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a fresh browsing session at the start of each cycle.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowsingSession>>;
}

/// Navigates and returns the rendered document in one step.
pub async fn fetch_rendered(session: &mut dyn BrowsingSession, url: &str) -> Result<String> {
    session.navigate(url).await?;
    session.content().await
}

pub struct ChromeLauncher {
    config: BrowserConfig,
}

pub struct ChromeSession {
    // Dropping the browser kills the Chrome process
    browser: Option<Browser>,
    tab: Arc<Tab>,
    timeout: Duration,
    in_flight: InFlight,
}

/// Tracks whether a devtools call is still running on the tab.
///
/// A timed-out call keeps its blocking thread, so the tab stays busy until
/// that thread returns. No new call may start on the tab meanwhile.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

/// Held by the thread running a devtools call; releases the tab on drop.
#[derive(Debug)]
pub struct InFlightToken(Arc<AtomicBool>);

impl InFlight {
    pub fn begin(&self, operation: &str) -> Result<InFlightToken> {
        if self.0.swap(true, Ordering::SeqCst) {
            return Err(AppError::Browser(format!(
                "{} refused: an earlier browser call is still running",
                operation
            )));
        }
        Ok(InFlightToken(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(self.config.sandbox)
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-setuid-sandbox"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        Ok(launch_options)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open(&self) -> Result<Box<dyn BrowsingSession>> {
        let launch_options = self.launch_options()?;
        let user_agent = self.config.user_agent.clone();
        let timeout = Duration::from_secs(self.config.navigation_timeout_secs);

        let launch = tokio::task::spawn_blocking(move || -> anyhow::Result<(Browser, Arc<Tab>)> {
            let browser = Browser::new(launch_options)?;
            let tab = browser.new_tab()?;
            tab.set_default_timeout(timeout);
            tab.set_user_agent(&user_agent, None, None)?;
            Ok((browser, tab))
        });

        // Launch gets a generous bound since Chrome cold starts are slow
        let (browser, tab) = match tokio::time::timeout(timeout * 2, launch).await {
            Err(_) => {
                return Err(AppError::Timeout {
                    operation: "browser launch".to_string(),
                    after: timeout * 2,
                });
            }
            Ok(Err(e)) => return Err(AppError::Browser(format!("Browser launch task failed: {}", e))),
            Ok(Ok(Err(e))) => return Err(AppError::Browser(format!("Failed to launch browser: {}", e))),
            Ok(Ok(Ok(launched))) => launched,
        };

        tracing::debug!("Browser session opened");
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
            timeout,
            in_flight: InFlight::default(),
        }))
    }
}

impl ChromeSession {
    /// Runs a blocking devtools call off the async runtime, bounded by the
    /// session timeout. On timeout the call keeps running and the tab stays
    /// busy, so the session must be discarded.
    async fn blocking<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Tab>) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.in_flight.begin(operation)?;
        let tab = Arc::clone(&self.tab);
        let task = tokio::task::spawn_blocking(move || {
            let result = f(tab);
            drop(token);
            result
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(AppError::Timeout {
                operation: operation.to_string(),
                after: self.timeout,
            }),
            Ok(Err(e)) => Err(AppError::Browser(format!("{} task failed: {}", operation, e))),
            Ok(Ok(Err(e))) => Err(AppError::Browser(format!("{} failed: {}", operation, e))),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

#[async_trait]
impl BrowsingSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let target = url.to_string();
        self.blocking("navigation", move |tab| {
            tab.navigate_to(&target)?.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            AppError::Browser(message) => AppError::Navigation {
                url: url.to_string(),
                message,
            },
            other => other,
        })
    }

    async fn content(&mut self) -> Result<String> {
        self.blocking("content read", |tab| tab.get_content()).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut session = self;
        let browser = session.browser.take();

        if session.in_flight.is_busy() {
            // Killing Chrome disconnects the transport and unblocks the stuck call
            tracing::debug!("Browser call still running; killing the browser");
            tokio::task::spawn_blocking(move || drop(browser))
                .await
                .map_err(|e| AppError::Browser(format!("browser close task failed: {}", e)))?;
            return Ok(());
        }

        session.blocking("browser close", move |tab| {
            if let Err(e) = tab.close(true) {
                tracing::debug!("Failed to close tab: {}", e);
            }
            drop(browser);
            Ok(())
        })
        .await?;
        tracing::debug!("Browser session closed");
        Ok(())
    }
}
