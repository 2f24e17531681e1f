use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod item;

// Re-exports for convenience
pub use item::*;

/// Outcome of a single availability check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityVerdict {
    Available,
    Unavailable,
    /// The probe errored or timed out; says nothing about stock.
    CheckFailed,
}

impl AvailabilityVerdict {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityVerdict::Available)
    }
}

impl std::fmt::Display for AvailabilityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AvailabilityVerdict::Available => "available",
            AvailabilityVerdict::Unavailable => "unavailable",
            AvailabilityVerdict::CheckFailed => "check failed",
        };
        f.write_str(label)
    }
}

/// Emitted once per positive detection and handed to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityEvent {
    pub name: String,
    pub url: String,
    pub detected_at: DateTime<Utc>,
}

impl AvailabilityEvent {
    pub fn new(item: &TrackedItem, detected_at: DateTime<Utc>) -> Self {
        Self {
            name: item.name.clone(),
            url: item.url.clone(),
            detected_at,
        }
    }
}
