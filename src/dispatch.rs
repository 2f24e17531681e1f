use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::AvailabilityEvent;
use crate::plugins::traits::Notifier;

/// Sending half handed to the cycle runner. Enqueueing never waits on
/// delivery.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<AvailabilityEvent>,
}

impl NotificationQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AvailabilityEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Returns false when the dispatcher is gone and the event was dropped.
    pub fn enqueue(&self, event: AvailabilityEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::error!("Notification dispatcher stopped; dropping event for '{}'", event.name);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains the queue and delivers each event once. Failures are logged and
/// not retried.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    receiver: mpsc::UnboundedReceiver<AvailabilityEvent>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, receiver: mpsc::UnboundedReceiver<AvailabilityEvent>) -> Self {
        Self { notifier, receiver }
    }

    pub fn spawn(self) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run())
    }

    /// Runs until every `NotificationQueue` has been dropped.
    pub async fn run(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();

        while let Some(event) = self.receiver.recv().await {
            match self.notifier.notify(&event).await {
                Ok(result) => {
                    stats.delivered += 1;
                    tracing::info!(
                        item = %event.name,
                        "Notification delivered: {}",
                        result.message_id.as_deref().unwrap_or("no request id")
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(item = %event.name, "Failed to deliver notification: {}", e);
                }
            }
        }

        tracing::debug!("Notification dispatcher stopped");
        stats
    }
}
