//! 调度引擎枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// 活动状态
///
/// 进入 ACTIVE 后由调度引擎独占维护；创建与作者主动暂停由外部完成
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// 草稿 - 尚未开始投放
    #[default]
    Draft,
    /// 进行中 - 参与每周分配
    Active,
    /// 已暂停 - 积分耗尽或作者暂停
    Paused,
    /// 已完成 - 达到目标书评数
    Completed,
}

/// 暂停原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PauseReason {
    /// 积分不足，补充积分后自动恢复
    InsufficientCredits,
    /// 作者手动暂停
    AuthorRequest,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientCredits => "insufficient_credits",
            Self::AuthorRequest => "author_request",
        }
    }
}

/// 任务（读者 × 活动名额）状态
///
/// 生命周期：
/// WAITING -> SCHEDULED -> APPROVED -> IN_PROGRESS -> SUBMITTED -> VALIDATED / REJECTED
/// APPROVED / IN_PROGRESS 超过截止时间 -> EXPIRED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// 排队中
    #[default]
    Waiting,
    /// 已排期，等待资料发放
    Scheduled,
    /// 资料已发放，截止计时中
    Approved,
    /// 读者已开始阅读
    InProgress,
    /// 书评已提交，等待审核
    Submitted,
    /// 审核通过
    Validated,
    /// 审核拒绝
    Rejected,
    /// 超时过期
    Expired,
}

impl AssignmentStatus {
    /// 占用名额的状态（同一读者在同一活动下最多一条）
    pub const ACTIVE: [AssignmentStatus; 4] = [
        Self::Waiting,
        Self::Scheduled,
        Self::Approved,
        Self::InProgress,
    ];

    /// 终态不可再变更
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validated | Self::Rejected | Self::Expired)
    }

    /// 是否占用读者在该活动下的唯一名额
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// 是否持有资料访问权（受截止时间约束）
    pub fn holds_access(&self) -> bool {
        matches!(self, Self::Approved | Self::InProgress)
    }

    /// 状态迁移表
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        matches!(
            (self, next),
            (Waiting, Scheduled)
                | (Scheduled, Approved)
                | (Approved, InProgress)
                | (Approved, Submitted)
                | (Approved, Expired)
                | (InProgress, Submitted)
                | (InProgress, Expired)
                | (Submitted, Validated)
                | (Submitted, Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Scheduled => "SCHEDULED",
            Self::Approved => "APPROVED",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Validated => "VALIDATED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }
}

/// 图书格式
///
/// 申请时确定，决定积分消耗与资料访问期限
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookFormat {
    #[default]
    Ebook,
    Audiobook,
}

impl BookFormat {
    /// 发放资料时扣除的活动积分
    pub fn credit_cost(&self) -> i32 {
        match self {
            Self::Ebook => 1,
            Self::Audiobook => 2,
        }
    }

    /// 资料访问是否有独立于截止时间的期限
    pub fn has_timed_access(&self) -> bool {
        matches!(self, Self::Audiobook)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ebook => "EBOOK",
            Self::Audiobook => "AUDIOBOOK",
        }
    }
}

/// 截止提醒类型（相对资料发放时间的偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum ReminderType {
    #[serde(rename = "24H")]
    #[sqlx(rename = "24H")]
    H24,
    #[serde(rename = "48H")]
    #[sqlx(rename = "48H")]
    H48,
    #[serde(rename = "60H")]
    #[sqlx(rename = "60H")]
    H60,
    #[serde(rename = "69H")]
    #[sqlx(rename = "69H")]
    H69,
    #[serde(rename = "72H")]
    #[sqlx(rename = "72H")]
    H72,
}

impl ReminderType {
    /// 发放时一次性创建的提醒阶梯
    pub const LADDER: [ReminderType; 5] = [Self::H24, Self::H48, Self::H60, Self::H69, Self::H72];

    pub fn offset(&self) -> Duration {
        Duration::hours(self.offset_hours())
    }

    pub fn offset_hours(&self) -> i64 {
        match self {
            Self::H24 => 24,
            Self::H48 => 48,
            Self::H60 => 60,
            Self::H69 => 69,
            Self::H72 => 72,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H24 => "24H",
            Self::H48 => "48H",
            Self::H60 => "60H",
            Self::H69 => "69H",
            Self::H72 => "72H",
        }
    }
}

/// 积分流水类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditTransactionType {
    /// 充值（+）
    Allocation,
    /// 发放资料扣除（-）
    Deduction,
    /// 剩余积分作废（-）
    Expiration,
}

impl CreditTransactionType {
    /// 返回该流水类型的金额符号
    pub fn sign(&self) -> i32 {
        match self {
            Self::Allocation => 1,
            Self::Deduction | Self::Expiration => -1,
        }
    }
}
