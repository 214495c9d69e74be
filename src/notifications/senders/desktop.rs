use async_trait::async_trait;
use notify_rust::{Notification, Timeout};

use super::{NotificationError, NotificationSender};

const DEFAULT_TIMEOUT_MS: u32 = 6_000;

/// A sender for OS desktop notifications (D-Bus, Windows toast, macOS).
pub struct DesktopSender {
    app_name: String,
    timeout_ms: u32,
}

impl DesktopSender {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[async_trait]
impl NotificationSender for DesktopSender {
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let app_name = self.app_name.clone();
        let title = title.to_string();
        let body = body.to_string();
        let timeout = Timeout::Milliseconds(self.timeout_ms);

        // The platform APIs block, keep them off the runtime threads.
        tokio::task::spawn_blocking(move || {
            Notification::new()
                .appname(&app_name)
                .summary(&title)
                .body(&body)
                .timeout(timeout)
                .show()
                .map(|_| ())
                .map_err(|e| NotificationError::SendFailed(e.to_string()))
        })
        .await
        .map_err(|e| NotificationError::TaskFailed(e.to_string()))?
    }
}
