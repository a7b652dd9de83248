//! 书评活动任务调度引擎
//!
//! 决定每周哪些读者占用活动名额、何时发放资料、何时收回访问权，
//! 并在这些状态变更中消耗活动积分。
//!
//! ## 核心功能
//!
//! - **每周分配**：按配额加 20% 超额缓冲，把 WAITING 任务排期为 SCHEDULED
//! - **每日发放**：扣积分并发放资料，积分不足时自动暂停活动
//! - **每小时截止检查**：发送截止提醒，过期超时任务并从排队中补位
//! - **积分账户**：充值、作废剩余积分，维护账户恒等式
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `clock`: 可注入的时钟
//! - `settings`: 引擎参数
//! - `repository`: 存储层与工作单元
//! - `service`: 作业与命令服务
//! - `worker`: 作业执行器与定时触发
//! - `lock`: 分布式作业锁
//! - `notification`: 通知端口
//! - `admin`: 管理入口

pub mod admin;
pub mod clock;
pub mod error;
pub mod lock;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;
pub mod settings;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, Result};
pub use lock::{LockGuard, LockManager};
pub use models::*;
pub use notification::{
    DispatchMode, LoggingNotifier, Notification, NotificationKind, NotificationSender, Notifier,
    PgOutboxNotifier, RecordingNotifier,
};
pub use repository::{InMemorySchedulingStore, PgSchedulingStore, SchedulingStore};
pub use service::{
    ApplicationService, CreditService, DeadlineMonitor, DistributionScheduler,
    MaterialReleaseRunner,
};
pub use settings::EngineSettings;
pub use worker::{CronWorker, JobKind, JobRunner};
