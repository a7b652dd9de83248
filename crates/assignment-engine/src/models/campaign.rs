//! 活动实体定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{CampaignStatus, PauseReason};

/// 书评活动
///
/// 作者为一本书购买的书评名额。积分账户满足
/// `credits_used + credits_remaining == credits_allocated`，且 `credits_remaining >= 0`。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    /// 作者 ID
    pub author_id: i64,
    /// 书名（通知展示用）
    pub book_title: String,
    /// 目标书评数
    pub target_reviews: i32,
    /// 每周基础配额
    pub reviews_per_week: i32,
    pub credits_allocated: i32,
    pub credits_used: i32,
    pub credits_remaining: i32,
    pub status: CampaignStatus,
    #[sqlx(default)]
    pub start_date: Option<NaiveDate>,
    #[sqlx(default)]
    pub expected_end_date: Option<NaiveDate>,
    /// 已完成的分配周数
    pub current_week: i32,
    /// 累计排期的读者数
    pub total_assigned_readers: i32,
    /// 累计过期的书评数
    pub reviews_expired: i32,
    /// 下一个排队序号（只增不减，序号不复用）
    pub next_queue_position: i32,
    #[sqlx(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub pause_reason: Option<PauseReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// 积分账户是否自洽
    pub fn credits_balanced(&self) -> bool {
        self.credits_remaining >= 0
            && self.credits_used + self.credits_remaining == self.credits_allocated
    }

    /// 是否能够承担一次资料发放
    pub fn can_afford(&self, cost: i32) -> bool {
        self.credits_remaining >= cost
    }

    /// 是否因积分不足被自动暂停（补充积分后可恢复）
    pub fn is_paused_for_credits(&self) -> bool {
        self.status == CampaignStatus::Paused
            && self.pause_reason == Some(PauseReason::InsufficientCredits)
    }
}
