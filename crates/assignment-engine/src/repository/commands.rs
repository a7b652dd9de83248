//! 工作单元的入参与结果
//!
//! 每个命令对应一个原子操作组，存储实现必须整体提交或整体回滚

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Assignment, AssignmentStatus, BookFormat, CampaignStatus, ReminderType};

/// 分页游标，按 `(时间, id)` 严格递增取下一页
///
/// 处理失败仍留在原状态的行不会再次出现在同一轮的后续页中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub at: DateTime<Utc>,
    pub id: i64,
}

/// 读者申请加入活动
#[derive(Debug, Clone)]
pub struct EnqueueReader {
    pub campaign_id: i64,
    pub reader_id: i64,
    pub format: BookFormat,
    pub now: DateTime<Utc>,
}

/// 每周分配：从排队中取出一批并排期
#[derive(Debug, Clone)]
pub struct ScheduleBatch {
    pub campaign_id: i64,
    pub base_slots: i32,
    pub buffer_slots: i32,
    pub scheduled_week: i32,
    pub scheduled_date: NaiveDate,
    pub now: DateTime<Utc>,
}

/// 每周分配结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// 基础名额内排期的任务
    pub base_ids: Vec<i64>,
    /// 超额缓冲排期的任务
    pub buffer_ids: Vec<i64>,
}

impl ScheduleOutcome {
    pub fn scheduled(&self) -> usize {
        self.base_ids.len() + self.buffer_ids.len()
    }
}

/// 资料发放
#[derive(Debug, Clone)]
pub struct MaterialRelease {
    pub assignment_id: i64,
    pub released_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    /// 有声书资料访问期限（电子书为空）
    pub materials_expires_at: Option<DateTime<Utc>>,
    pub access_token: Uuid,
}

/// 资料发放结果
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    /// 已发放并扣除积分
    Released {
        assignment: Assignment,
        credits_debited: i32,
        balance_after: i32,
    },
    /// 积分不足，未做任何变更
    InsufficientCredits {
        campaign_id: i64,
        required: i32,
        available: i32,
    },
    /// 活动不在进行中，保持排期等待下次
    CampaignInactive {
        campaign_id: i64,
        status: CampaignStatus,
    },
    /// 任务已不是 SCHEDULED（重复执行或并发处理）
    NotScheduled { status: AssignmentStatus },
}

/// 过期处理
#[derive(Debug, Clone)]
pub struct Expiration {
    pub assignment_id: i64,
    pub now: DateTime<Utc>,
    /// 补位任务的排期日期与周序号
    pub promote_date: NaiveDate,
    pub promote_week: i32,
    pub reliability_penalty: i32,
}

/// 过期处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum ExpirationOutcome {
    Expired {
        assignment_id: i64,
        campaign_id: i64,
        reader_id: i64,
        reliability_score: i32,
        /// 补位的排队任务
        promoted_assignment_id: Option<i64>,
    },
    /// 任务状态或截止时间已不满足过期条件
    Skipped {
        assignment_id: i64,
        status: AssignmentStatus,
    },
}

/// 新建提醒
#[derive(Debug, Clone)]
pub struct NewReminders {
    pub assignment_id: i64,
    pub ladder: Vec<(ReminderType, DateTime<Utc>)>,
    pub now: DateTime<Utc>,
}
