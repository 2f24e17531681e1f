pub mod cache;
pub mod config;
pub mod dispatch;
pub mod element_finder;
pub mod models;
pub mod monitor;
pub mod plugins;
pub mod scheduler;
pub mod scraper;
pub mod utils;

// Re-export commonly used types
pub use cache::FoundCache;
pub use config::AppConfig;
pub use models::{AvailabilityEvent, AvailabilityVerdict, TrackedItem};
pub use monitor::{CycleReport, CycleRunner, MonitorSettings};
pub use scheduler::MonitorScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
