//! 存储 Trait 定义
//!
//! 服务层只依赖 `SchedulingStore`，每个写方法是一个独立的工作单元：
//! 要么全部生效，要么不留下任何痕迹。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::commands::{
    EnqueueReader, Expiration, ExpirationOutcome, MaterialRelease, NewReminders, ReleaseOutcome,
    PageCursor, ScheduleBatch, ScheduleOutcome,
};
use crate::error::Result;
use crate::models::{
    Assignment, Campaign, CreditTransaction, DueReminder, PauseReason, ReaderProfile, Reminder,
};

/// 调度存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    // 查询
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>>;
    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>>;
    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>>;
    async fn list_waiting(&self, campaign_id: i64, limit: i64) -> Result<Vec<Assignment>>;
    /// 排期日期不晚于 `today` 的 SCHEDULED 任务
    async fn list_releasable(&self, today: NaiveDate) -> Result<Vec<Assignment>>;
    /// 截止时间早于 `now` 的 APPROVED / IN_PROGRESS 任务，按 `(deadline_at, id)` 排序
    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<Assignment>>;
    /// 到期未发的提醒，按 `(scheduled_for, id)` 排序；
    /// 所属任务已不再持有资料（已提交、已过期等）的提醒不返回
    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<DueReminder>>;
    async fn list_reminders(&self, assignment_id: i64) -> Result<Vec<Reminder>>;
    async fn list_credit_transactions(&self, campaign_id: i64) -> Result<Vec<CreditTransaction>>;
    async fn get_reader_profile(&self, reader_id: i64) -> Result<Option<ReaderProfile>>;

    // 工作单元
    async fn enqueue_reader(&self, cmd: &EnqueueReader) -> Result<Assignment>;
    async fn schedule_assignments(&self, cmd: &ScheduleBatch) -> Result<ScheduleOutcome>;
    async fn release_materials(&self, cmd: &MaterialRelease) -> Result<ReleaseOutcome>;
    /// 已存在的同类型提醒跳过，返回实际新建的数量
    async fn create_reminders(&self, cmd: &NewReminders) -> Result<u64>;
    /// 仅当提醒尚未发送时标记，返回是否标记成功
    async fn mark_reminder_sent(&self, reminder_id: i64, sent_at: DateTime<Utc>) -> Result<bool>;
    async fn expire_assignment(&self, cmd: &Expiration) -> Result<ExpirationOutcome>;
    /// 仅暂停 ACTIVE 活动，返回是否发生了状态变更
    async fn pause_campaign(
        &self,
        campaign_id: i64,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    async fn allocate_credits(
        &self,
        campaign_id: i64,
        amount: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign>;
    async fn expire_remaining_credits(&self, campaign_id: i64, now: DateTime<Utc>)
    -> Result<Campaign>;
}
