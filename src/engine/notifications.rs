use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::MatchNotification;
use crate::services::{Store, StoreError};

/// Inbox reads for stored notifications
pub struct NotificationService {
    store: Arc<dyn Store>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_notifications(&self, user_id: &str, unread_only: bool) -> EngineResult<Vec<MatchNotification>> {
        Ok(self.store.notifications_for(user_id, unread_only).await?)
    }

    /// Someone else's notification reads as missing
    pub async fn mark_notification_read(&self, notification_id: Uuid, user_id: &str) -> EngineResult<MatchNotification> {
        self.store
            .mark_notification_read(notification_id, user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => EngineError::not_found("notification", notification_id),
                other => other.into(),
            })
    }
}
