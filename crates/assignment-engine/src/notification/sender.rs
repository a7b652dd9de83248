//! 通知发送器
//!
//! 业务流程通过它发送通知。投递失败只记录日志，不会传回调用方，
//! 也不会回滚已提交的状态变更。截止提醒例外：调用方需要知道结果
//! 才能决定是否标记已发送，因此提供同步的 `dispatch`。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::channels::Notifier;
use super::types::Notification;
use crate::error::Result;
use crate::models::{Assignment, Campaign, DueReminder, PauseReason};

/// 发送方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// 放到后台任务中发送
    #[default]
    Background,
    /// 在当前任务中等待发送完成（测试使用，便于断言）
    Inline,
}

#[derive(Clone)]
pub struct NotificationSender {
    notifier: Arc<dyn Notifier>,
    mode: DispatchMode,
}

impl NotificationSender {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            mode: DispatchMode::Background,
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn send_materials_ready(&self, assignment: &Assignment, now: DateTime<Utc>) {
        self.send(Notification::materials_ready(assignment, now)).await;
    }

    pub async fn send_campaign_paused(
        &self,
        campaign: &Campaign,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) {
        self.send(Notification::campaign_paused(campaign, reason, now))
            .await;
    }

    pub async fn send_behind_schedule(
        &self,
        campaign_id: i64,
        base_slots: i32,
        filled: usize,
        scheduled_week: i32,
        now: DateTime<Utc>,
    ) {
        self.send(Notification::behind_schedule(
            campaign_id,
            base_slots,
            filled,
            scheduled_week,
            now,
        ))
        .await;
    }

    /// 同步投递截止提醒，返回投递结果
    pub async fn dispatch_reminder(&self, reminder: &DueReminder, now: DateTime<Utc>) -> Result<()> {
        self.notifier
            .notify(Notification::deadline_reminder(reminder, now))
            .await
    }

    /// 发送通知（fire-and-forget）
    async fn send(&self, notification: Notification) {
        match self.mode {
            DispatchMode::Inline => deliver(self.notifier.clone(), notification).await,
            DispatchMode::Background => {
                let notifier = self.notifier.clone();
                tokio::spawn(deliver(notifier, notification));
            }
        }
    }
}

async fn deliver(notifier: Arc<dyn Notifier>, notification: Notification) {
    let notification_id = notification.notification_id.clone();
    let kind = notification.kind;
    let recipient = notification.recipient.address();

    match notifier.notify(notification).await {
        Ok(()) => {
            info!(
                notification_id = %notification_id,
                kind = kind.as_str(),
                recipient = %recipient,
                channel = notifier.name(),
                "通知发送成功"
            );
        }
        Err(e) => {
            error!(
                notification_id = %notification_id,
                kind = kind.as_str(),
                recipient = %recipient,
                error = %e,
                "通知发送失败"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::ReminderType;
    use crate::notification::channels::MockNotifier;
    use crate::notification::types::NotificationKind;

    fn due_reminder() -> DueReminder {
        DueReminder {
            id: 1,
            assignment_id: 2,
            reminder_type: ReminderType::H24,
            scheduled_for: Utc::now(),
            reader_id: 3,
            campaign_id: 4,
            deadline_at: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_reminder_propagates_failure() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .times(1)
            .returning(|_| Err(EngineError::Notification("smtp down".to_string())));

        let sender = NotificationSender::new(Arc::new(mock));
        let result = sender.dispatch_reminder(&due_reminder(), Utc::now()).await;
        assert!(matches!(result, Err(EngineError::Notification(_))));
    }

    #[tokio::test]
    async fn test_fire_and_forget_swallows_failure() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .withf(|n| n.kind == NotificationKind::BehindSchedule)
            .times(1)
            .returning(|_| Err(EngineError::Notification("queue full".to_string())));

        let sender = NotificationSender::new(Arc::new(mock)).with_mode(DispatchMode::Inline);
        // 失败不会 panic，也不会返回错误
        sender.send_behind_schedule(1, 10, 0, 12, Utc::now()).await;
    }

    #[tokio::test]
    async fn test_background_mode_delivers() {
        let mut mock = MockNotifier::new();
        mock.expect_notify().times(1).returning(|_| Ok(()));
        mock.expect_name().return_const("mock".to_string());

        let sender = NotificationSender::new(Arc::new(mock));
        sender.send_behind_schedule(1, 10, 3, 12, Utc::now()).await;

        // 等待后台任务完成
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
