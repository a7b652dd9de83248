//! 作业报告
//!
//! 每次作业执行返回一份可序列化的报告，用于日志和管理入口的响应

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::repository::ExpirationOutcome;

/// 单项处理失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub item_id: i64,
    pub error_code: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item_id: i64, error: &crate::error::EngineError) -> Self {
        Self {
            item_id,
            error_code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// 单个活动的分配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDistribution {
    pub campaign_id: i64,
    pub base_slots: i32,
    pub buffer_slots: i32,
    pub base_scheduled: usize,
    pub buffer_scheduled: usize,
}

impl CampaignDistribution {
    pub fn scheduled(&self) -> usize {
        self.base_scheduled + self.buffer_scheduled
    }
}

/// 落后于排期的活动
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehindSchedule {
    pub campaign_id: i64,
    pub base_slots: i32,
    pub filled: usize,
}

/// 每周分配报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub run_at: DateTime<Utc>,
    pub scheduled_week: i32,
    pub scheduled_date: NaiveDate,
    pub campaigns: Vec<CampaignDistribution>,
    pub behind_schedule: Vec<BehindSchedule>,
    pub failures: Vec<ItemFailure>,
}

impl DistributionReport {
    pub fn new(run_at: DateTime<Utc>, scheduled_week: i32, scheduled_date: NaiveDate) -> Self {
        Self {
            run_at,
            scheduled_week,
            scheduled_date,
            campaigns: Vec::new(),
            behind_schedule: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn total_scheduled(&self) -> usize {
        self.campaigns.iter().map(CampaignDistribution::scheduled).sum()
    }
}

/// 因积分不足跳过的发放
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRelease {
    pub assignment_id: i64,
    pub campaign_id: i64,
    pub required: i32,
    pub available: i32,
}

/// 每日资料发放报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseReport {
    pub run_at: DateTime<Utc>,
    pub candidates: usize,
    pub released: Vec<i64>,
    pub credits_debited: i64,
    pub reminders_created: u64,
    pub insufficient_credits: Vec<SkippedRelease>,
    /// 本次自动暂停的活动
    pub campaigns_paused: Vec<i64>,
    /// 活动不在进行中而保持排期的任务
    pub campaign_inactive: Vec<i64>,
    pub failures: Vec<ItemFailure>,
}

impl ReleaseReport {
    pub fn new(run_at: DateTime<Utc>, candidates: usize) -> Self {
        Self {
            run_at,
            candidates,
            released: Vec::new(),
            credits_debited: 0,
            reminders_created: 0,
            insufficient_credits: Vec::new(),
            campaigns_paused: Vec::new(),
            campaign_inactive: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// 每小时截止检查报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineReport {
    pub run_at: DateTime<Utc>,
    pub reminders_sent: usize,
    pub reminders_failed: Vec<ItemFailure>,
    pub expirations: Vec<ExpirationOutcome>,
    pub failures: Vec<ItemFailure>,
}

impl DeadlineReport {
    pub fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            reminders_sent: 0,
            reminders_failed: Vec::new(),
            expirations: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn expired_count(&self) -> usize {
        self.expirations
            .iter()
            .filter(|o| matches!(o, ExpirationOutcome::Expired { .. }))
            .count()
    }

    pub fn promoted_count(&self) -> usize {
        self.expirations
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    ExpirationOutcome::Expired {
                        promoted_assignment_id: Some(_),
                        ..
                    }
                )
            })
            .count()
    }
}

/// 作业报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "job", content = "report")]
pub enum JobReport {
    WeeklyDistribution(DistributionReport),
    DailyRelease(ReleaseReport),
    HourlyDeadline(DeadlineReport),
}

impl JobReport {
    /// 存在单项失败时为 partial
    pub fn status(&self) -> &'static str {
        let failed = match self {
            Self::WeeklyDistribution(r) => !r.failures.is_empty(),
            Self::DailyRelease(r) => !r.failures.is_empty(),
            Self::HourlyDeadline(r) => !r.failures.is_empty() || !r.reminders_failed.is_empty(),
        };
        if failed { "partial" } else { "success" }
    }
}
