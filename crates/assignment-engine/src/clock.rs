//! 时钟抽象
//!
//! 所有"现在/今天"都从这里取值，统一为 UTC。测试中注入 `FixedClock`
//! 即可确定性地驱动三个作业，不依赖真实时间。

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// 当前 UTC 日期
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// 当前 ISO 周序号
    fn iso_week(&self) -> i32 {
        iso_week(self.now())
    }
}

/// ISO 周序号（周一为一周起点，含当年第一个周四的周为第 1 周）
pub fn iso_week(at: DateTime<Utc>) -> i32 {
    at.iso_week().week() as i32
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 可手动拨动的时钟
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
