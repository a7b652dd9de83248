//! 调度引擎参数

use chrono::{DateTime, Duration, Utc};

use crate::models::{BookFormat, ReminderType};

/// 调度引擎可调参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 超额缓冲比例
    pub buffer_ratio: f64,
    /// 资料发放后的书评提交窗口
    pub review_window: Duration,
    /// 有声书资料访问期限
    pub audiobook_access: Duration,
    /// 每次过期扣减的信誉分
    pub reliability_penalty: i32,
    /// 单次处理的提醒数量上限
    pub reminder_batch_size: i64,
    /// 单次处理的过期任务数量上限
    pub expiration_batch_size: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            buffer_ratio: 0.20,
            review_window: Duration::hours(72),
            audiobook_access: Duration::days(7),
            reliability_penalty: 5,
            reminder_batch_size: 500,
            expiration_batch_size: 500,
        }
    }
}

impl EngineSettings {
    pub fn from_scheduler_config(config: &campaign_shared::config::SchedulerConfig) -> Self {
        Self {
            reminder_batch_size: config.reminder_batch_size,
            expiration_batch_size: config.expiration_batch_size,
            ..Self::default()
        }
    }

    /// 计算一个活动本周的名额
    pub fn slot_plan(&self, reviews_per_week: i32) -> SlotPlan {
        let base = reviews_per_week.max(0);
        // 先取整到 1e-9 再向上取整，避免 10 * 0.2 这类浮点误差多出一个名额
        let raw = f64::from(base) * self.buffer_ratio;
        let buffer = ((raw * 1e9).round() / 1e9).ceil() as i32;
        SlotPlan { base, buffer }
    }

    /// 资料访问截止（仅有声书）
    pub fn materials_expiry(
        &self,
        format: BookFormat,
        released_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        format
            .has_timed_access()
            .then(|| released_at + self.audiobook_access)
    }

    /// 书评截止时间
    pub fn deadline(&self, released_at: DateTime<Utc>) -> DateTime<Utc> {
        released_at + self.review_window
    }

    /// 提醒阶梯
    pub fn reminder_ladder(&self, released_at: DateTime<Utc>) -> Vec<(ReminderType, DateTime<Utc>)> {
        ReminderType::LADDER
            .iter()
            .map(|t| (*t, released_at + t.offset()))
            .collect()
    }
}

/// 单个活动的周名额
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub base: i32,
    pub buffer: i32,
}

impl SlotPlan {
    pub fn total(&self) -> i32 {
        self.base + self.buffer
    }

    /// 实际排期数是否低于基础配额
    pub fn is_behind(&self, filled: usize) -> bool {
        (filled as i64) < i64::from(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_plan_rounds_buffer_up() {
        let settings = EngineSettings::default();
        assert_eq!(settings.slot_plan(10), SlotPlan { base: 10, buffer: 2 });
        assert_eq!(settings.slot_plan(7), SlotPlan { base: 7, buffer: 2 });
        assert_eq!(settings.slot_plan(5), SlotPlan { base: 5, buffer: 1 });
        assert_eq!(settings.slot_plan(1), SlotPlan { base: 1, buffer: 1 });
        assert_eq!(settings.slot_plan(0), SlotPlan { base: 0, buffer: 0 });
        assert_eq!(settings.slot_plan(10).total(), 12);
    }

    #[test]
    fn test_behind_schedule() {
        let plan = EngineSettings::default().slot_plan(10);
        assert!(plan.is_behind(0));
        assert!(plan.is_behind(9));
        assert!(!plan.is_behind(10));
        assert!(!plan.is_behind(12));
    }

    #[test]
    fn test_release_windows() {
        let settings = EngineSettings::default();
        let now = Utc::now();
        assert_eq!(settings.deadline(now), now + Duration::hours(72));
        assert_eq!(settings.materials_expiry(BookFormat::Ebook, now), None);
        assert_eq!(
            settings.materials_expiry(BookFormat::Audiobook, now),
            Some(now + Duration::days(7))
        );

        let ladder = settings.reminder_ladder(now);
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder[3], (ReminderType::H69, now + Duration::hours(69)));
    }
}
