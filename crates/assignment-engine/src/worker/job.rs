//! 作业类型

use std::fmt;
use std::str::FromStr;

use campaign_shared::config::SchedulerConfig;
use serde::Serialize;

use crate::error::EngineError;

/// 三个定时作业
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    WeeklyDistribution,
    DailyRelease,
    HourlyDeadline,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        Self::WeeklyDistribution,
        Self::DailyRelease,
        Self::HourlyDeadline,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::WeeklyDistribution => "weekly-distribution",
            Self::DailyRelease => "daily-release",
            Self::HourlyDeadline => "hourly-deadline",
        }
    }

    /// 作业对应的 cron 表达式
    pub fn cron_expression<'a>(&self, config: &'a SchedulerConfig) -> &'a str {
        match self {
            Self::WeeklyDistribution => &config.weekly_cron,
            Self::DailyRelease => &config.daily_cron,
            Self::HourlyDeadline => &config.hourly_cron,
        }
    }

    /// 跨实例锁的键
    pub fn lock_key(&self) -> String {
        format!("job:{}", self.name())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| EngineError::UnknownJob(s.to_string()))
    }
}
