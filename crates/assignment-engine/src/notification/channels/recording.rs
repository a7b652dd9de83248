//! 内存记录通知

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Notifier;
use crate::error::{EngineError, Result};
use crate::notification::types::{Notification, NotificationKind};

/// 记录所有投递成功的通知，可按类型注入失败
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<NotificationKind>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后该类型的通知都投递失败
    pub fn fail_kind(&self, kind: NotificationKind) {
        self.failing.lock().insert(kind);
    }

    pub fn recover(&self) {
        self.failing.lock().clear();
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_of(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: Notification) -> Result<()> {
        if self.failing.lock().contains(&notification.kind) {
            return Err(EngineError::Notification(format!(
                "{} 投递失败",
                notification.kind.as_str()
            )));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}
