//! 通知任务表
//!
//! 把通知写入 notification_tasks，由独立的发送服务异步处理

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::Notifier;
use crate::error::Result;
use crate::notification::types::Notification;

pub struct PgOutboxNotifier {
    pool: PgPool,
}

impl PgOutboxNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgOutboxNotifier {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn notify(&self, notification: Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_tasks (
                notification_id, recipient, trigger_type, template_params, status, created_at
            )
            VALUES ($1, $2, $3, $4, 'pending', $5)
            ON CONFLICT (notification_id) DO NOTHING
            "#,
        )
        .bind(&notification.notification_id)
        .bind(notification.recipient.address())
        .bind(notification.kind.as_str())
        .bind(&notification.payload)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            notification_id = %notification.notification_id,
            kind = notification.kind.as_str(),
            "通知任务已创建"
        );

        Ok(())
    }
}
