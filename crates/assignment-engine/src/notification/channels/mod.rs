//! 通知投递实现
//!
//! - **Logging**: 只记录日志，本地运行使用
//! - **Outbox**: 写入 notification_tasks 表，由下游发送服务消费
//! - **Recording**: 保存在内存中，测试使用

mod logging;
mod outbox;
mod recording;

pub use logging::LoggingNotifier;
pub use outbox::PgOutboxNotifier;
pub use recording::RecordingNotifier;

use async_trait::async_trait;

use super::types::Notification;
use crate::error::Result;

/// 通知投递接口
///
/// 实现只负责把通知交给外部系统，不做重试
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 投递渠道名称（用于日志）
    fn name(&self) -> &str;

    async fn notify(&self, notification: Notification) -> Result<()>;
}
