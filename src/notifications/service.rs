use tracing::{info, warn};

use super::senders::{desktop::DesktopSender, NotificationSender};
use crate::monitor_modules::change_detector::DetectorEvent;
use crate::monitor_modules::config::MonitorConfig;

pub const NOTIFICATION_TITLE: &str = "Hypixel Monitor";

/// Reports detector events on the console and, when enabled, to a sender.
pub struct Notifier {
    sender: Option<Box<dyn NotificationSender>>,
}

impl Notifier {
    pub fn console_only() -> Self {
        Self { sender: None }
    }

    pub fn with_sender(sender: Box<dyn NotificationSender>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        if config.notify {
            Self::with_sender(Box::new(DesktopSender::new(NOTIFICATION_TITLE)))
        } else {
            Self::console_only()
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Logs `event` and forwards `changed` events to the sender.
    /// Delivery failures are logged and swallowed.
    pub async fn dispatch(&self, event: &DetectorEvent) {
        match event {
            DetectorEvent::Initial(_) => info!(event = event.kind(), "[INIT] {event}"),
            DetectorEvent::Unchanged(_) => info!(event = event.kind(), "{event}"),
            DetectorEvent::Changed { .. } => {
                info!(event = event.kind(), "[CHANGE] {event}");
                if let Some(sender) = &self.sender {
                    if let Err(e) = sender.send(NOTIFICATION_TITLE, &event.to_string()).await {
                        warn!(error = %e, "Desktop notification could not be delivered.");
                    }
                }
            }
        }
    }
}
