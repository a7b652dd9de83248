//! 日志通知

use async_trait::async_trait;
use tracing::info;

use super::Notifier;
use crate::error::Result;
use crate::notification::types::Notification;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    fn name(&self) -> &str {
        "logging"
    }

    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            notification_id = %notification.notification_id,
            kind = notification.kind.as_str(),
            recipient = %notification.recipient.address(),
            payload = %notification.payload,
            "通知"
        );
        Ok(())
    }
}
