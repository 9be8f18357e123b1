use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::models::MatchNotification;

/// Fire-and-forget delivery of notifications that are already persisted.
///
/// Implementations must not block and never report failure to the caller.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: &MatchNotification);

    fn dispatch_all(&self, notifications: &[MatchNotification]) {
        for notification in notifications {
            self.dispatch(notification);
        }
    }
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, notification: &MatchNotification) {
        tracing::info!(
            user_id = %notification.user_id,
            kind = %notification.notification_type,
            "Notification: {}",
            notification.title
        );
    }
}

/// POSTs each notification as JSON to a webhook from a spawned task
pub struct WebhookNotifier {
    client: Client,
    url: Arc<str>,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
        Ok(Self {
            client,
            url: Arc::from(url),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn dispatch(&self, notification: &MatchNotification) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime available, dropping notification {}", notification.id);
            return;
        };

        let client = self.client.clone();
        let url = Arc::clone(&self.url);
        let notification = notification.clone();

        handle.spawn(async move {
            match client.post(url.as_ref()).json(&notification).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Delivered notification {} to webhook", notification.id);
                }
                Ok(response) => {
                    tracing::warn!(
                        "Webhook rejected notification {}: {}",
                        notification.id,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to deliver notification {}: {}", notification.id, e);
                }
            }
        });
    }
}
