pub mod probe;
pub mod notifier;

pub use probe::Probe;
pub use notifier::{Notifier, NotificationResult};
