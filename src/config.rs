use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.163 Safari/537.36";
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub files: FilesConfig,
    pub monitor: MonitorConfig,
    pub browser: BrowserConfig,
    pub pushover: PushoverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub items_path: PathBuf,
    pub cache_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub cycle_interval_secs: u64,
    pub item_delay_ms: u64,
    pub suppression_window_hours: i64,
    pub probe_timeout_secs: u64,
    pub disabled_retailers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub sandbox: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub navigation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    pub api_url: String,
    pub user: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            items_path: PathBuf::from("items.json5"),
            cache_path: PathBuf::from("found.db.json"),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 60,
            item_delay_ms: 1000,
            suppression_window_hours: 24,
            probe_timeout_secs: 60,
            // Bestbuy.com times out frequently and slows down the rest of the cycle
            disabled_retailers: vec!["Bestbuy".to_string()],
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_width: 1680,
            window_height: 1050,
            navigation_timeout_secs: 30,
        }
    }
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            api_url: PUSHOVER_API_URL.to_string(),
            user: None,
            token: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl MonitorConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Saturates instead of panicking; `validate` rejects out-of-range values.
    pub fn suppression_window(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.suppression_window_hours).unwrap_or(chrono::Duration::MAX)
    }
}

impl AppConfig {
    /// Loads configuration from `explicit` when given, otherwise from the
    /// optional `config/default`, `config/{RUN_MODE}` and `config/local` files.
    /// Environment variables prefixed `WATCHER__` override file values.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match explicit {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
                builder = builder
                    .add_source(File::with_name("config/default").required(false))
                    .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
                    .add_source(File::with_name("config/local").required(false));
            }
        }

        let s = builder
            .add_source(
                Environment::with_prefix("WATCHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Fills values that are conventionally supplied through plain environment
    /// variables rather than the prefixed ones.
    pub fn apply_env_fallbacks(&mut self) {
        if self.pushover.user.is_none() {
            self.pushover.user = env::var("PUSHOVER_USER").ok();
        }
        if self.pushover.token.is_none() {
            self.pushover.token = env::var("PUSHOVER_TOKEN").ok();
        }
        if self.browser.chrome_path.is_none() {
            self.browser.chrome_path = env::var("CHROME_PATH").ok().map(PathBuf::from);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.cycle_interval_secs == 0 {
            return Err(ConfigError::Message("Monitor cycle_interval_secs must be greater than 0".into()));
        }

        if self.monitor.suppression_window_hours <= 0 {
            return Err(ConfigError::Message("Monitor suppression_window_hours must be greater than 0".into()));
        }

        if chrono::Duration::try_hours(self.monitor.suppression_window_hours).is_none() {
            return Err(ConfigError::Message("Monitor suppression_window_hours is out of range".into()));
        }

        if self.monitor.probe_timeout_secs == 0 {
            return Err(ConfigError::Message("Monitor probe_timeout_secs must be greater than 0".into()));
        }

        if self.browser.navigation_timeout_secs == 0 {
            return Err(ConfigError::Message("Browser navigation_timeout_secs must be greater than 0".into()));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message("Browser window dimensions must be greater than 0".into()));
        }

        if Url::parse(&self.pushover.api_url).is_err() {
            return Err(ConfigError::Message("Invalid Pushover api_url format".into()));
        }

        if self.pushover.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Pushover request_timeout_secs must be greater than 0".into()));
        }

        Ok(())
    }

    /// The notification transport cannot run without both credentials.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        if !present(&self.pushover.user) || !present(&self.pushover.token) {
            return Err(ConfigError::Message(
                "Environment variables PUSHOVER_USER and PUSHOVER_TOKEN are required".into(),
            ));
        }

        Ok(())
    }
}
