use async_trait::async_trait;
use thiserror::Error;

pub mod desktop;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Notification task did not complete: {0}")]
    TaskFailed(String),
}

/// A trait for delivering a notification to the user.
/// Delivery is best effort; callers log failures and carry on.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends a notification.
    ///
    /// # Arguments
    ///
    /// * `title` - Short headline, e.g. the application name.
    /// * `body` - The message itself.
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError>;
}
