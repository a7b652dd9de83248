//! 任务与读者实体定义
//!
//! 包含读者在活动中的名额记录、截止提醒和读者信誉计数

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AssignmentStatus, BookFormat, ReminderType};

/// 任务（读者对活动名额的占用）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub campaign_id: i64,
    pub reader_id: i64,
    pub status: AssignmentStatus,
    /// 活动内排队序号（申请时分配，不复用）
    pub queue_position: i32,
    /// 是否来自超额缓冲池
    pub is_buffer_assignment: bool,
    /// 图书格式（申请时确定）
    pub format_assigned: BookFormat,
    /// ISO 周序号
    #[sqlx(default)]
    pub scheduled_week: Option<i32>,
    #[sqlx(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[sqlx(default)]
    pub materials_released_at: Option<DateTime<Utc>>,
    /// 资料访问截止（仅有声书）
    #[sqlx(default)]
    pub materials_expires_at: Option<DateTime<Utc>>,
    /// 书评提交截止
    #[sqlx(default)]
    pub deadline_at: Option<DateTime<Utc>>,
    /// 资料访问令牌，过期时清除
    #[sqlx(default)]
    pub access_token: Option<Uuid>,
    #[sqlx(default)]
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// 截止时间已过且仍持有访问权
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.holds_access() && self.deadline_at.is_some_and(|d| d < now)
    }

    /// 资料是否仍可访问
    pub fn has_material_access(&self, now: DateTime<Utc>) -> bool {
        if !self.status.holds_access() || self.access_token.is_none() {
            return false;
        }
        match self.materials_expires_at {
            Some(expires_at) => now < expires_at,
            None => self.deadline_at.is_none_or(|d| now <= d),
        }
    }
}

/// 截止提醒
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: i64,
    pub assignment_id: i64,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub email_sent: bool,
    #[sqlx(default)]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 待发送的提醒（含投递所需的上下文）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DueReminder {
    pub id: i64,
    pub assignment_id: i64,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub reader_id: i64,
    pub campaign_id: i64,
    #[sqlx(default)]
    pub deadline_at: Option<DateTime<Utc>>,
}

/// 读者信誉计数
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReaderProfile {
    pub reader_id: i64,
    /// 信誉分 0-100
    pub reliability_score: i32,
    pub reviews_expired: i32,
    pub updated_at: DateTime<Utc>,
}

impl ReaderProfile {
    pub const INITIAL_SCORE: i32 = 100;

    pub fn new(reader_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            reader_id,
            reliability_score: Self::INITIAL_SCORE,
            reviews_expired: 0,
            updated_at: now,
        }
    }

    /// 记录一次过期：计数加一，信誉分扣减且不低于 0
    pub fn apply_expiration(&mut self, penalty: i32, now: DateTime<Utc>) {
        self.reviews_expired += 1;
        self.reliability_score = (self.reliability_score - penalty).max(0);
        self.updated_at = now;
    }
}
