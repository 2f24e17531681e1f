use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::AvailabilityEvent;
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub message_id: Option<String>,
}

/// Push transport for availability events. Delivery is best effort: callers
/// log failures and never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult>;
}
