//! 定时触发 Worker
//!
//! 每个作业一个 Worker，按 cron 表达式（UTC）计算下一次触发时间，
//! 睡眠到点后交给 `JobRunner` 执行。上一次还没结束时跳过本次触发。

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, info, warn};

use campaign_shared::observability::metrics;

use super::job::JobKind;
use super::runner::JobRunner;
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::repository::SchedulingStore;

/// 定时触发 Worker
pub struct CronWorker<S>
where
    S: SchedulingStore,
{
    kind: JobKind,
    schedule: Schedule,
    runner: Arc<JobRunner<S>>,
    clock: Arc<dyn Clock>,
}

impl<S> CronWorker<S>
where
    S: SchedulingStore + 'static,
{
    pub fn new(
        kind: JobKind,
        cron_expression: &str,
        runner: Arc<JobRunner<S>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(cron_expression).map_err(|e| {
            EngineError::Validation(format!("无效的 cron 表达式 {}: {}", cron_expression, e))
        })?;
        Ok(Self {
            kind,
            schedule,
            runner,
            clock,
        })
    }

    /// `after` 之后的下一次触发时间
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// 主循环：持续触发直到进程退出
    pub async fn run(&self) {
        let worker = format!("cron_{}", self.kind.name().replace('-', "_"));
        info!(job = self.kind.name(), "定时 Worker 已启动");

        loop {
            let now = self.clock.now();
            let Some(next) = self.next_fire_after(now) else {
                error!(job = self.kind.name(), "cron 表达式没有后续触发时间，Worker 退出");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(job = self.kind.name(), next_fire = %next, "等待下一次触发");
            tokio::time::sleep(wait).await;

            match self.runner.trigger(self.kind).await {
                Ok(_) => {}
                Err(EngineError::JobAlreadyRunning(_)) => {
                    warn!(job = self.kind.name(), "上一次执行尚未结束，跳过本次触发");
                }
                // 失败已由 JobRunner 记录，下一次触发时重试
                Err(_) => {}
            }

            metrics::set_worker_last_run(&worker);
        }
    }
}
