//! 作业执行器
//!
//! 定时触发和手动触发都经过这里。每个作业一把进程内互斥锁，
//! 可选再加一把跨实例锁；任一锁被占用时直接返回 `JobAlreadyRunning`，
//! 不排队等待。不同作业之间互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, instrument, warn};

use campaign_shared::observability::metrics;

use super::job::JobKind;
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::lock::LockManager;
use crate::repository::{PgSchedulingStore, SchedulingStore};
use crate::service::{DeadlineMonitor, DistributionScheduler, JobReport, MaterialReleaseRunner};

/// 最近一次执行记录
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// success / partial / failed
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 作业状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: JobKind,
    pub running: bool,
    pub last_run: Option<JobRunRecord>,
}

/// 作业执行器
pub struct JobRunner<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    distribution: DistributionScheduler<S>,
    release: MaterialReleaseRunner<S>,
    deadline: DeadlineMonitor<S>,
    clock: Arc<dyn Clock>,
    guards: HashMap<JobKind, AsyncMutex<()>>,
    lock_manager: Option<Arc<LockManager>>,
    lock_ttl: Duration,
    last_runs: Mutex<HashMap<JobKind, JobRunRecord>>,
}

impl<S> JobRunner<S>
where
    S: SchedulingStore,
{
    pub fn new(
        distribution: DistributionScheduler<S>,
        release: MaterialReleaseRunner<S>,
        deadline: DeadlineMonitor<S>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            distribution,
            release,
            deadline,
            clock,
            guards: JobKind::ALL
                .into_iter()
                .map(|kind| (kind, AsyncMutex::new(())))
                .collect(),
            lock_manager: None,
            lock_ttl: Duration::from_secs(3600),
            last_runs: Mutex::new(HashMap::new()),
        }
    }

    /// 启用跨实例作业锁
    pub fn with_lock_manager(mut self, lock_manager: Arc<LockManager>, ttl: Duration) -> Self {
        self.lock_manager = Some(lock_manager);
        self.lock_ttl = ttl;
        self
    }

    fn guard(&self, kind: JobKind) -> Result<&AsyncMutex<()>> {
        self.guards
            .get(&kind)
            .ok_or_else(|| EngineError::UnknownJob(kind.name().to_string()))
    }

    /// 作业是否正在本实例执行
    pub fn is_running(&self, kind: JobKind) -> bool {
        self.guard(kind).is_ok_and(|g| g.try_lock().is_err())
    }

    /// 全部作业的状态
    pub fn statuses(&self) -> Vec<JobStatus> {
        let last_runs = self.last_runs.lock();
        JobKind::ALL
            .into_iter()
            .map(|job| JobStatus {
                job,
                running: self.is_running(job),
                last_run: last_runs.get(&job).cloned(),
            })
            .collect()
    }

    /// 执行一次作业
    ///
    /// 同一作业已在执行时立即返回 `JobAlreadyRunning`
    #[instrument(skip(self), fields(job = kind.name()))]
    pub async fn trigger(&self, kind: JobKind) -> Result<JobReport> {
        let _local = self
            .guard(kind)?
            .try_lock()
            .map_err(|_| EngineError::JobAlreadyRunning(kind.name().to_string()))?;

        let remote = match &self.lock_manager {
            Some(manager) => {
                let guard = manager
                    .try_acquire(&kind.lock_key(), Some(self.lock_ttl))
                    .await?;
                if guard.is_none() {
                    warn!("作业正在其他实例执行");
                    return Err(EngineError::JobAlreadyRunning(kind.name().to_string()));
                }
                guard
            }
            None => None,
        };

        let started_at = self.clock.now();
        let timer = Instant::now();
        info!("作业开始");

        let result = self.execute(kind).await;

        if let Some(guard) = remote
            && let Err(e) = guard.release().await
        {
            error!(error = %e, "释放作业锁失败，等待 TTL 到期");
        }

        let elapsed = timer.elapsed().as_secs_f64();
        let record = match &result {
            Ok(report) => {
                info!(status = report.status(), elapsed_secs = elapsed, "作业完成");
                JobRunRecord {
                    started_at,
                    finished_at: self.clock.now(),
                    status: report.status().to_string(),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, elapsed_secs = elapsed, "作业执行失败");
                JobRunRecord {
                    started_at,
                    finished_at: self.clock.now(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                }
            }
        };
        metrics::record_job_run(kind.name(), &record.status, elapsed);
        self.last_runs.lock().insert(kind, record);

        result
    }

    async fn execute(&self, kind: JobKind) -> Result<JobReport> {
        match kind {
            JobKind::WeeklyDistribution => {
                self.distribution.run().await.map(JobReport::WeeklyDistribution)
            }
            JobKind::DailyRelease => self.release.run().await.map(JobReport::DailyRelease),
            JobKind::HourlyDeadline => self.deadline.run().await.map(JobReport::HourlyDeadline),
        }
    }
}
