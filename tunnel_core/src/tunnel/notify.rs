//! Ongoing "tunnel is up" notification.

use thiserror::Error;
use tracing::info;

/// Notification failures. These never affect a state transition.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// There was no notification to clear
    #[error("No notification shown for {0}")]
    NotShown(String),

    /// The notification service refused the request
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Shows and clears a persistent notification for an active tunnel.
pub trait NotificationSink: Send + Sync {
    fn post_ongoing(&self, tunnel: &str) -> Result<(), NotifyError>;
    fn cancel(&self, tunnel: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn post_ongoing(&self, tunnel: &str) -> Result<(), NotifyError> {
        info!(tunnel = %tunnel, "Tunnel active");
        Ok(())
    }

    fn cancel(&self, tunnel: &str) -> Result<(), NotifyError> {
        info!(tunnel = %tunnel, "Tunnel inactive");
        Ok(())
    }
}
