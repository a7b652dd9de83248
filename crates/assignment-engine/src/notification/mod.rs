//! 通知模块
//!
//! 通知投递是外部协作方。引擎只产生通知，投递结果不影响状态流转。

pub mod channels;
mod sender;
mod types;

pub use channels::{LoggingNotifier, Notifier, PgOutboxNotifier, RecordingNotifier};
pub use sender::{DispatchMode, NotificationSender};
pub use types::{Notification, NotificationKind, Recipient};
